use anyhow::Result;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::warn;
use platform_spine::osm::PlatformExtract;
use platform_spine::spherical::great_circle_distance_m;
use platform_spine::spine::SpineBatch;
use serde_json::{Map, json};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes one LineString feature per spine, sorted by way id for stable
/// output, optionally followed by a MultiPoint of all rail-adjacent nodes.
pub fn write_geojson(
    path: &Path,
    batch: &SpineBatch,
    extract: &PlatformExtract,
    include_close_nodes: bool,
) -> Result<()> {
    let mut spines: Vec<_> = batch.spines.iter().collect();
    spines.sort_by_key(|(way, _)| **way);

    let mut features = Vec::with_capacity(spines.len() + 1);
    for (way, spine) in spines {
        let length_m = great_circle_distance_m(spine.start, spine.end);
        if length_m < 0.001 {
            warn!("platform {} has a zero-length spine, skipping export", way);
            continue;
        }

        let mut properties = Map::new();
        properties.insert("way".to_string(), json!(way.to_string()));
        properties.insert("length_m".to_string(), json!(length_m));

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(vec![
                vec![spine.start.x(), spine.start.y()],
                vec![spine.end.x(), spine.end.y()],
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    if include_close_nodes {
        let coordinates: Vec<Vec<f64>> = batch
            .close_nodes
            .iter()
            .filter_map(|(_, node)| extract.nodes.get(node))
            .map(|node| vec![node.lon, node.lat])
            .collect();

        let mut properties = Map::new();
        properties.insert("role".to_string(), json!("close_nodes"));

        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::MultiPoint(coordinates))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), &collection)?;
    Ok(())
}
