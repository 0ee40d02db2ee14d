use geo::{Bearing, Destination, Haversine};
use geo_types::{LineString, Point};
use itertools::Itertools;
use log::{debug, warn};
use rstar::RTree;
use rstar::primitives::{GeomWithData, Rectangle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundError {
    #[error("bound ring has {points} points (closed: {closed}), want a closed 5-point ring")]
    MalformedBound { points: usize, closed: bool },
}

/// Builds a closed rectangular ring around the segment p1 -> p2, extended
/// perpendicularly by `pad_m` metres on both sides.
///
/// The ring is `[n1, n2, n3, n4, n1]` where n1/n2 sit `pad_m` either side of
/// p1 and n4/n3 either side of p2, so the ring is non-self-intersecting and
/// its winding is fixed. `point_in_bound` relies on that winding.
pub fn rotated_bound_with_pad(p1: Point<f64>, p2: Point<f64>, pad_m: f64) -> LineString<f64> {
    let bearing = Haversine.bearing(p1, p2);
    // rem_euclid keeps both perpendiculars in [0, 360) for any segment
    // orientation, including bearings reported as negatives.
    let bearing_up = (bearing + 90.0).rem_euclid(360.0);
    let bearing_down = (bearing + 270.0).rem_euclid(360.0);

    let n1 = Haversine.destination(p1, bearing_up, pad_m);
    let n2 = Haversine.destination(p1, bearing_down, pad_m);
    let n3 = Haversine.destination(p2, bearing_down, pad_m);
    let n4 = Haversine.destination(p2, bearing_up, pad_m);

    LineString::new(vec![n1.into(), n2.into(), n3.into(), n4.into(), n1.into()])
}

/// Tests whether `point` lies inside (or on the edge of) a closed 5-point
/// rectangle ring, using the signed cross product of each edge against the
/// vector to the point.
///
/// The test runs in planar (longitude, latitude) space. At platform scale
/// (tens to hundreds of metres) the flat-earth error is far below node
/// placement accuracy; do not reuse this for regions spanning degrees.
pub fn point_in_bound(ring: &LineString<f64>, point: Point<f64>) -> Result<bool, BoundError> {
    if ring.0.len() != 5 || !ring.is_closed() {
        return Err(BoundError::MalformedBound {
            points: ring.0.len(),
            closed: ring.is_closed(),
        });
    }

    for i in 0..4 {
        let a = ring.0[i];
        let b = ring.0[i + 1];
        let edge = (b.x - a.x, b.y - a.y);
        let to_point = (point.x() - a.x, point.y() - a.y);

        let cross = edge.0 * to_point.1 - edge.1 * to_point.0;
        if cross > 0.0 {
            // Point is on the outward side of this edge.
            return Ok(false);
        }
    }
    Ok(true)
}

/// Immutable set of padded track-segment bounds with an R-tree over their
/// bounding boxes. Built once, then shared read-only across all platform
/// classifications.
pub struct RailBoundIndex {
    bounds: Vec<LineString<f64>>,
    rtree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl RailBoundIndex {
    /// Build one padded bound per consecutive point pair of each track
    /// polyline. Zero-length segments produce no bound.
    pub fn from_tracks(tracks: &[Vec<Point<f64>>], pad_m: f64) -> Self {
        let mut rings = Vec::new();
        for track in tracks {
            for (p1, p2) in track.iter().tuple_windows() {
                if p1 == p2 {
                    debug!("skipping zero-length track segment at {:?}", p1);
                    continue;
                }
                rings.push(rotated_bound_with_pad(*p1, *p2, pad_m));
            }
        }
        Self::from_rings(rings)
    }

    /// Index caller-supplied rings. Malformed rings are still held (so the
    /// classifier can report them) but rings without any points cannot match
    /// anything and are left out of the tree.
    pub fn from_rings(rings: Vec<LineString<f64>>) -> Self {
        let items = rings
            .iter()
            .enumerate()
            .filter_map(|(index, ring)| {
                let Some((min, max)) = ring_aabb(ring) else {
                    warn!("rail bound {} has no points, ignoring", index);
                    return None;
                };
                Some(GeomWithData::new(Rectangle::from_corners(min, max), index))
            })
            .collect();

        RailBoundIndex {
            bounds: rings,
            rtree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn rings(&self) -> &[LineString<f64>] {
        &self.bounds
    }

    /// True when `point` falls inside any bound. The R-tree narrows the
    /// candidates (an AABB encloses its ring, so no containing ring is ever
    /// skipped); the exact ring test decides. A malformed ring is reported
    /// and treated as non-matching, without aborting the remaining
    /// candidates.
    pub fn close_to_rails(&self, point: Point<f64>) -> bool {
        self.rtree
            .locate_all_at_point(&[point.x(), point.y()])
            .any(|item| match point_in_bound(&self.bounds[item.data], point) {
                Ok(inside) => inside,
                Err(err) => {
                    warn!("rail bound {} failed containment test: {}", item.data, err);
                    false
                }
            })
    }
}

fn ring_aabb(ring: &LineString<f64>) -> Option<([f64; 2], [f64; 2])> {
    let mut min = [f64::INFINITY, f64::INFINITY];
    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    for coord in &ring.0 {
        min[0] = min[0].min(coord.x);
        min[1] = min[1].min(coord.y);
        max[0] = max[0].max(coord.x);
        max[1] = max[1].max(coord.y);
    }
    if min[0] > max[0] {
        return None;
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Distance;

    #[test]
    fn test_bound_is_closed_five_point_ring() {
        let p1 = Point::new(13.40, 52.50);
        let p2 = Point::new(13.402, 52.501);
        let ring = rotated_bound_with_pad(p1, p2, 25.0);

        assert_eq!(ring.0.len(), 5);
        assert_eq!(ring.0[0], ring.0[4]);
    }

    #[test]
    fn test_bound_side_lengths() {
        let p1 = Point::new(13.40, 52.50);
        let p2 = Point::new(13.402, 52.501);
        let pad = 25.0;
        let ring = rotated_bound_with_pad(p1, p2, pad);
        let segment_len = Haversine.distance(p1, p2);

        let side = |i: usize| {
            Haversine.distance(Point::from(ring.0[i]), Point::from(ring.0[i + 1]))
        };

        // n1-n2 and n3-n4 are the pad sides (2 * pad across the segment),
        // n2-n3 and n4-n1 run parallel to the segment.
        assert!((side(0) - 2.0 * pad).abs() < 0.1);
        assert!((side(2) - 2.0 * pad).abs() < 0.1);
        assert!((side(1) - segment_len).abs() < 0.1);
        assert!((side(3) - segment_len).abs() < 0.1);
    }

    #[test]
    fn test_bound_orientation_invariance() {
        // Same segment walked in both directions must produce rings of the
        // same extent; the < 90 / >= 90 bearing special-casing this replaces
        // used to make that asymmetric.
        let p1 = Point::new(-0.1278, 51.5074);
        let p2 = Point::new(-0.1290, 51.5068);
        let forward = rotated_bound_with_pad(p1, p2, 10.0);
        let backward = rotated_bound_with_pad(p2, p1, 10.0);

        let mid = Point::new((p1.x() + p2.x()) / 2.0, (p1.y() + p2.y()) / 2.0);
        assert!(point_in_bound(&forward, mid).unwrap());
        assert!(point_in_bound(&backward, mid).unwrap());
    }

    #[test]
    fn test_midpoint_inside() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(0.001, 0.0);
        let ring = rotated_bound_with_pad(p1, p2, 50.0);
        let mid = Point::new(0.0005, 0.0);
        assert!(point_in_bound(&ring, mid).unwrap());
    }

    #[test]
    fn test_far_point_outside() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(0.001, 0.0);
        let ring = rotated_bound_with_pad(p1, p2, 50.0);
        // 500 m due north of the midpoint, 10x the pad.
        let outside = Haversine.destination(Point::new(0.0005, 0.0), 0.0, 500.0);
        assert!(!point_in_bound(&ring, outside).unwrap());
    }

    #[test]
    fn test_corner_point_is_inside() {
        // Boundary-inclusive: a ring corner sits on two edges and must
        // classify as inside.
        let ring = rotated_bound_with_pad(Point::new(0.0, 0.0), Point::new(0.001, 0.0), 50.0);
        let corner = Point::from(ring.0[0]);
        assert!(point_in_bound(&ring, corner).unwrap());
    }

    #[test]
    fn test_malformed_rings_rejected() {
        let four_points = LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ]);
        assert!(point_in_bound(&four_points, Point::new(0.5, 0.25)).is_err());

        let unclosed = LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 0.5),
        ]);
        assert!(point_in_bound(&unclosed, Point::new(0.5, 0.5)).is_err());
    }

    #[test]
    fn test_index_malformed_ring_treated_as_non_matching() {
        let malformed = LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 0.0),
        ]);
        let valid = rotated_bound_with_pad(Point::new(2.0, 0.0), Point::new(2.001, 0.0), 50.0);
        let index = RailBoundIndex::from_rings(vec![malformed, valid]);

        assert_eq!(index.len(), 2);
        // Under the malformed ring's bbox: not close.
        assert!(!index.close_to_rails(Point::new(0.5, 0.5)));
        // The valid ring still matches.
        assert!(index.close_to_rails(Point::new(2.0005, 0.0)));
    }

    #[test]
    fn test_index_agrees_with_brute_force() {
        let tracks = vec![
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.001, 0.0002),
                Point::new(0.002, 0.0),
            ],
            vec![Point::new(0.0005, 0.001), Point::new(0.0015, 0.001)],
        ];
        let index = RailBoundIndex::from_tracks(&tracks, 30.0);
        assert_eq!(index.len(), 3);

        for i in 0..40 {
            for j in 0..40 {
                let probe = Point::new(-0.0005 + i as f64 * 0.0001, -0.0005 + j as f64 * 0.0001);
                let brute = index
                    .rings()
                    .iter()
                    .any(|ring| point_in_bound(ring, probe).unwrap());
                assert_eq!(index.close_to_rails(probe), brute, "probe {:?}", probe);
            }
        }
    }
}
