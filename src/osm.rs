// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// OSM ingestion: platform boundaries and rail track ways from a PBF extract

use crate::is_null_island;
use ahash::{AHashMap, AHashSet};
use geo_types::Point;
use log::{debug, info, warn};
use osmpbfreader::{OsmObj, OsmPbfReader};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Typed wrapper for OSM node IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OsmNodeId(pub i64);

impl fmt::Display for OsmNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Typed wrapper for OSM way IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OsmWayId(pub i64);

impl fmt::Display for OsmWayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A map point with identity and coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsmNode {
    pub id: OsmNodeId,
    pub lon: f64,
    pub lat: f64,
}

impl OsmNode {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Ordered boundary of one platform way. The boundary is closed when the
/// first and last node id coincide.
#[derive(Debug, Clone)]
pub struct PlatformBoundary {
    pub way: OsmWayId,
    pub nodes: Vec<OsmNodeId>,
}

/// One rail way; consecutive node pairs become the track segments the
/// spine extraction pads into bounds.
#[derive(Debug, Clone)]
pub struct RailTrack {
    pub way: OsmWayId,
    pub nodes: Vec<OsmNodeId>,
    pub mode: RailMode,
}

/// Rail transport modes mapped from OSM railway=* values that carry
/// vehicles past a platform edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RailMode {
    Rail,
    LightRail,
    Subway,
    Tram,
    NarrowGauge,
}

impl RailMode {
    /// Parse from an OSM railway=* tag value. Infrastructure values
    /// (platform, station, abandoned, ...) yield None.
    pub fn from_osm_tag(value: &str) -> Option<Self> {
        match value {
            "rail" => Some(RailMode::Rail),
            "light_rail" => Some(RailMode::LightRail),
            "subway" => Some(RailMode::Subway),
            "tram" => Some(RailMode::Tram),
            "narrow_gauge" => Some(RailMode::NarrowGauge),
            _ => None,
        }
    }
}

/// True for ways tagged as a passenger platform.
pub fn is_platform_tagging(public_transport: Option<&str>, railway: Option<&str>) -> bool {
    public_transport == Some("platform") || railway == Some("platform")
}

/// Everything the spine pipeline needs from one PBF extract.
pub struct PlatformExtract {
    pub platforms: Vec<PlatformBoundary>,
    pub tracks: Vec<RailTrack>,
    pub nodes: AHashMap<OsmNodeId, OsmNode>,
}

impl PlatformExtract {
    /// Load platform and rail ways from a PBF file using a two-pass scan:
    /// ways first to learn which node ids matter, then node coordinates.
    pub fn load_from_pbf(path: &Path) -> anyhow::Result<Self> {
        info!("loading platforms and rail tracks from {:?}", path);

        let (platform_ids, track_ids, node_ids) = Self::pass1_collect_ids(path)?;
        info!(
            "pass 1 complete: {} platform ways, {} track ways, {} referenced nodes",
            platform_ids.len(),
            track_ids.len(),
            node_ids.len()
        );

        let (platforms, tracks, nodes) =
            Self::pass2_load_data(path, &platform_ids, &track_ids, &node_ids)?;
        info!("pass 2 complete: {} node coordinates loaded", nodes.len());

        Ok(PlatformExtract {
            platforms,
            tracks,
            nodes,
        })
    }

    fn pass1_collect_ids(
        path: &Path,
    ) -> anyhow::Result<(AHashSet<OsmWayId>, AHashSet<OsmWayId>, AHashSet<OsmNodeId>)> {
        let file = File::open(path)?;
        let mut reader = OsmPbfReader::new(BufReader::new(file));

        let mut platform_ids = AHashSet::new();
        let mut track_ids = AHashSet::new();
        let mut node_ids = AHashSet::new();

        for obj in reader.iter() {
            let obj = obj?;
            let OsmObj::Way(way) = obj else {
                continue;
            };

            let is_platform = is_platform_tagging(
                way.tags.get("public_transport").map(|v| v.as_str()),
                way.tags.get("railway").map(|v| v.as_str()),
            );
            let is_track = way
                .tags
                .get("railway")
                .and_then(|v| RailMode::from_osm_tag(v))
                .is_some();

            if is_platform {
                platform_ids.insert(OsmWayId(way.id.0));
            } else if is_track {
                track_ids.insert(OsmWayId(way.id.0));
            } else {
                continue;
            }
            for node_ref in &way.nodes {
                node_ids.insert(OsmNodeId(node_ref.0));
            }
        }

        Ok((platform_ids, track_ids, node_ids))
    }

    fn pass2_load_data(
        path: &Path,
        platform_ids: &AHashSet<OsmWayId>,
        track_ids: &AHashSet<OsmWayId>,
        node_ids: &AHashSet<OsmNodeId>,
    ) -> anyhow::Result<(
        Vec<PlatformBoundary>,
        Vec<RailTrack>,
        AHashMap<OsmNodeId, OsmNode>,
    )> {
        let file = File::open(path)?;
        let mut reader = OsmPbfReader::new(BufReader::new(file));

        let mut platforms = Vec::with_capacity(platform_ids.len());
        let mut tracks = Vec::with_capacity(track_ids.len());
        let mut nodes = AHashMap::with_capacity(node_ids.len());

        for obj in reader.iter() {
            let obj = obj?;
            match obj {
                OsmObj::Node(node) => {
                    let id = OsmNodeId(node.id.0);
                    if !node_ids.contains(&id) {
                        continue;
                    }
                    if is_null_island(node.lon(), node.lat()) {
                        debug!("dropping null-island node {}", id);
                        continue;
                    }
                    nodes.insert(
                        id,
                        OsmNode {
                            id,
                            lon: node.lon(),
                            lat: node.lat(),
                        },
                    );
                }
                OsmObj::Way(way) => {
                    let id = OsmWayId(way.id.0);
                    let way_nodes: Vec<OsmNodeId> =
                        way.nodes.iter().map(|n| OsmNodeId(n.0)).collect();

                    if platform_ids.contains(&id) {
                        platforms.push(PlatformBoundary {
                            way: id,
                            nodes: way_nodes,
                        });
                    } else if track_ids.contains(&id) {
                        let Some(mode) = way
                            .tags
                            .get("railway")
                            .and_then(|v| RailMode::from_osm_tag(v))
                        else {
                            continue;
                        };
                        tracks.push(RailTrack {
                            way: id,
                            nodes: way_nodes,
                            mode,
                        });
                    }
                }
                OsmObj::Relation(_) => {
                    // Platforms mapped as multipolygon relations would need
                    // member assembly; way platforms cover the vast majority.
                }
            }
        }

        Ok((platforms, tracks, nodes))
    }

    /// Resolve every track way into a polyline of points, dropping node
    /// references without coordinates.
    pub fn track_polylines(&self) -> Vec<Vec<Point<f64>>> {
        self.tracks
            .iter()
            .map(|track| {
                track
                    .nodes
                    .iter()
                    .filter_map(|id| {
                        let node = self.nodes.get(id);
                        if node.is_none() {
                            warn!("track {} references unknown node {}", track.way, id);
                        }
                        node.map(OsmNode::point)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rail_mode_from_tag() {
        assert_eq!(RailMode::from_osm_tag("rail"), Some(RailMode::Rail));
        assert_eq!(RailMode::from_osm_tag("light_rail"), Some(RailMode::LightRail));
        assert_eq!(RailMode::from_osm_tag("subway"), Some(RailMode::Subway));
        assert_eq!(RailMode::from_osm_tag("tram"), Some(RailMode::Tram));
        assert_eq!(RailMode::from_osm_tag("narrow_gauge"), Some(RailMode::NarrowGauge));

        assert_eq!(RailMode::from_osm_tag("platform"), None);
        assert_eq!(RailMode::from_osm_tag("station"), None);
        assert_eq!(RailMode::from_osm_tag("abandoned"), None);
        assert_eq!(RailMode::from_osm_tag(""), None);
    }

    #[test]
    fn test_platform_tagging() {
        assert!(is_platform_tagging(Some("platform"), None));
        assert!(is_platform_tagging(None, Some("platform")));
        assert!(is_platform_tagging(Some("platform"), Some("rail")));

        assert!(!is_platform_tagging(Some("stop_position"), None));
        assert!(!is_platform_tagging(None, Some("rail")));
        assert!(!is_platform_tagging(None, None));
    }

    #[test]
    fn test_track_polylines_skip_unknown_nodes() {
        let mut nodes = AHashMap::new();
        nodes.insert(
            OsmNodeId(1),
            OsmNode {
                id: OsmNodeId(1),
                lon: 8.5,
                lat: 47.4,
            },
        );
        nodes.insert(
            OsmNodeId(3),
            OsmNode {
                id: OsmNodeId(3),
                lon: 8.501,
                lat: 47.4,
            },
        );

        let extract = PlatformExtract {
            platforms: vec![],
            tracks: vec![RailTrack {
                way: OsmWayId(7),
                nodes: vec![OsmNodeId(1), OsmNodeId(2), OsmNodeId(3)],
                mode: RailMode::Rail,
            }],
            nodes,
        };

        let polylines = extract.track_polylines();
        assert_eq!(polylines.len(), 1);
        assert_eq!(
            polylines[0],
            vec![Point::new(8.5, 47.4), Point::new(8.501, 47.4)]
        );
    }
}
