// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Trillium - derives platform spines from an OSM PBF extract

mod export;

use anyhow::Result;
use clap::Parser;
use log::info;
use platform_spine::bound::RailBoundIndex;
use platform_spine::osm::PlatformExtract;
use platform_spine::spine::{SpineConfig, compute_platform_spines};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Derive platform spines from OSM rail data", long_about = None)]
struct Args {
    /// Path to an OSM PBF extract containing platforms and rail tracks
    #[arg(long, env = "PLATFORM_OSM_PBF")]
    osm_pbf: PathBuf,

    /// Perpendicular pad around each track segment, in metres
    #[arg(long, env = "PLATFORM_PAD_METRES", default_value_t = 6.0)]
    pad_metres: f64,

    /// Output GeoJSON path
    #[arg(long, default_value = "platform_spines.geojson")]
    out: PathBuf,

    /// Only commit adjacency runs that end before the boundary does
    /// (the scan behavior of the original implementation)
    #[arg(long)]
    legacy_scan: bool,

    /// Also export every node classified close to rails, for inspection
    #[arg(long)]
    export_close_nodes: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let extract = PlatformExtract::load_from_pbf(&args.osm_pbf)?;
    info!(
        "extract holds {} platform ways and {} track ways",
        extract.platforms.len(),
        extract.tracks.len()
    );

    let track_polylines = extract.track_polylines();
    let rails = RailBoundIndex::from_tracks(&track_polylines, args.pad_metres);
    info!(
        "built {} padded rail bounds (pad {} m)",
        rails.len(),
        args.pad_metres
    );

    let config = SpineConfig {
        commit_trailing_run: !args.legacy_scan,
    };
    let batch = compute_platform_spines(&extract.platforms, &extract.nodes, &rails, &config);
    info!(
        "{} of {} platforms got a spine, {} rail-adjacent nodes seen",
        batch.spines.len(),
        extract.platforms.len(),
        batch.close_nodes.len()
    );

    export::write_geojson(&args.out, &batch, &extract, args.export_close_nodes)?;
    info!("wrote {}", args.out.display());

    Ok(())
}
