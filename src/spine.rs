// Derives a single representative segment (the "spine") per platform from
// its boundary nodes: classify every node against the padded rail bounds,
// rotate the circular boundary so a wrap-around run stays contiguous, then
// take the longest run of rail-adjacent nodes.

use crate::bound::RailBoundIndex;
use crate::osm::{OsmNode, OsmNodeId, OsmWayId, PlatformBoundary};
use ahash::AHashMap;
use geo_types::Point;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

/// The straight-line approximation of a platform's usable length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlatformSpine {
    pub start: Point<f64>,
    pub end: Point<f64>,
}

#[derive(Debug, Clone)]
pub struct SpineConfig {
    /// Also commit a run that is still open when the scan ends.
    ///
    /// The scan otherwise commits only on a closing non-adjacent node, which
    /// drops every run reaching the end of the rotated vector -- and the
    /// de-wrap rotation places every wrap-around run exactly there. `false`
    /// reproduces that older behavior.
    pub commit_trailing_run: bool,
}

impl Default for SpineConfig {
    fn default() -> Self {
        SpineConfig {
            commit_trailing_run: true,
        }
    }
}

/// Result of a single-platform extraction. `close_nodes` lists every
/// boundary node that classified as rail-adjacent (closed boundaries only),
/// for inspection output.
#[derive(Debug, Clone)]
pub struct SpineExtraction {
    pub spine: Option<PlatformSpine>,
    pub close_nodes: Vec<OsmNodeId>,
}

/// Everything the batch run produces: at most one spine per platform way,
/// plus the flattened rail-adjacent node diagnostics.
#[derive(Debug, Default)]
pub struct SpineBatch {
    pub spines: AHashMap<OsmWayId, PlatformSpine>,
    pub close_nodes: Vec<(OsmWayId, OsmNodeId)>,
}

/// Extracts the spine of one platform boundary.
///
/// A non-closed boundary (first node id != last node id) degenerates to the
/// segment between its first and last node. A closed boundary is treated as
/// a circular sequence: the longest contiguous run of nodes inside any rail
/// bound becomes the spine.
pub fn extract_spine(
    platform: OsmWayId,
    nodes: &[OsmNode],
    rails: &RailBoundIndex,
    config: &SpineConfig,
) -> SpineExtraction {
    let node_count = nodes.len();
    if node_count == 0 {
        warn!("platform {} has an empty boundary, no spine", platform);
        return SpineExtraction {
            spine: None,
            close_nodes: Vec::new(),
        };
    }

    if nodes[0].id != nodes[node_count - 1].id {
        // Open boundary: the platform is mapped as a line, not a ring. Its
        // endpoints are the spine.
        return SpineExtraction {
            spine: Some(PlatformSpine {
                start: nodes[0].point(),
                end: nodes[node_count - 1].point(),
            }),
            close_nodes: Vec::new(),
        };
    }

    let mut closeness: Vec<bool> = nodes
        .iter()
        .map(|node| rails.close_to_rails(node.point()))
        .collect();
    let mut ring: Vec<&OsmNode> = nodes.iter().collect();

    // A run may straddle the seam of the circular sequence. Rotating both
    // vectors so index 0 holds the first non-adjacent node turns any such
    // run into a contiguous one.
    let first_open = closeness.iter().position(|&close| !close);
    match first_open {
        Some(offset) => {
            closeness.rotate_left(offset);
            ring.rotate_left(offset);
        }
        None => debug!("platform {}: every boundary node is close to rails", platform),
    }

    // When the whole ring is rail-adjacent there is nothing to rotate and
    // the duplicated closing node would glue the run back onto its own
    // start; scanning the distinct nodes only gives the full-ring spine.
    let scan_len = if first_open.is_none() && node_count > 1 {
        node_count - 1
    } else {
        node_count
    };

    let mut close_nodes = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut current: Option<(usize, usize)> = None;

    let commit = |candidate: (usize, usize), best: &mut Option<(usize, usize)>| {
        let best_span = best.map_or(0, |(start, end)| end - start);
        if candidate.1 - candidate.0 > best_span {
            *best = Some(candidate);
        }
    };

    for (index, &close) in closeness[..scan_len].iter().enumerate() {
        if close {
            debug!("platform {}: node {} is close to rails", platform, ring[index].id);
            close_nodes.push(ring[index].id);
            current = match current {
                Some((start, _)) => Some((start, index)),
                None => Some((index, index)),
            };
        } else if let Some(run) = current.take() {
            commit(run, &mut best);
        }
    }
    if config.commit_trailing_run {
        if let Some(run) = current.take() {
            commit(run, &mut best);
        }
    }

    match best {
        Some((start, end)) => SpineExtraction {
            spine: Some(PlatformSpine {
                start: ring[start].point(),
                end: ring[end].point(),
            }),
            close_nodes,
        },
        None => {
            warn!("found no suitable spine for platform {}", platform);
            SpineExtraction {
                spine: None,
                close_nodes,
            }
        }
    }
}

/// Runs spine extraction over all platforms. Platforms are independent, so
/// the work fans out over rayon; results are folded into owned collections
/// afterwards, one spine entry per platform at most.
pub fn compute_platform_spines(
    platforms: &[PlatformBoundary],
    nodes: &AHashMap<OsmNodeId, OsmNode>,
    rails: &RailBoundIndex,
    config: &SpineConfig,
) -> SpineBatch {
    let extractions: Vec<(OsmWayId, SpineExtraction)> = platforms
        .par_iter()
        .map(|platform| {
            let boundary: Vec<OsmNode> = platform
                .nodes
                .iter()
                .filter_map(|id| {
                    let node = nodes.get(id).copied();
                    if node.is_none() {
                        warn!("platform {} references unknown node {}", platform.way, id);
                    }
                    node
                })
                .collect();
            (platform.way, extract_spine(platform.way, &boundary, rails, config))
        })
        .collect();

    let mut batch = SpineBatch {
        spines: AHashMap::with_capacity(extractions.len()),
        close_nodes: Vec::new(),
    };
    for (way, extraction) in extractions {
        if let Some(spine) = extraction.spine {
            batch.spines.insert(way, spine);
        }
        batch
            .close_nodes
            .extend(extraction.close_nodes.into_iter().map(|node| (way, node)));
    }
    batch
}
