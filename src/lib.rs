// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Platform spine derivation from OSM platform and rail track geometry

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect
)]

pub mod bound;
pub mod osm;
pub mod spherical;
pub mod spine;

pub const WGS_84_SRID: u32 = 4326;

/// (0, 0) is the classic placeholder coordinate in broken OSM and GTFS data.
pub fn is_null_island(lon: f64, lat: f64) -> bool {
    lon.abs() < 1e-7 && lat.abs() < 1e-7
}
