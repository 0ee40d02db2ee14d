// ===========================================================================
// Unit-Sphere Coordinate Conversion
// ===========================================================================

use geo_types::Point;

/// Mean earth radius in metres, matching the haversine helpers elsewhere.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic point as a unit vector on the sphere.
///
/// Derived on demand from (longitude, latitude) degrees when trig-accurate
/// angle math is needed; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalPoint(pub [f64; 3]);

impl SphericalPoint {
    /// Convert a (longitude, latitude) degree point to a unit-sphere vector.
    pub fn from_point(point: Point<f64>) -> Self {
        let lon = point.x().to_radians();
        let lat = point.y().to_radians();
        SphericalPoint([
            lat.cos() * lon.cos(),
            lat.cos() * lon.sin(),
            lat.sin(),
        ])
    }

    /// Convert back to a (longitude, latitude) degree point.
    pub fn to_point(&self) -> Point<f64> {
        let [x, y, z] = self.0;
        let lat = z.atan2(x.hypot(y));
        let lon = y.atan2(x);
        Point::new(lon.to_degrees(), lat.to_degrees())
    }

    /// Central angle between two unit vectors, in radians.
    ///
    /// atan2 of cross and dot magnitudes stays accurate for both nearly
    /// coincident and nearly antipodal points, unlike plain acos.
    pub fn angle_to(&self, other: &SphericalPoint) -> f64 {
        let [ax, ay, az] = self.0;
        let [bx, by, bz] = other.0;
        let cross = [
            ay * bz - az * by,
            az * bx - ax * bz,
            ax * by - ay * bx,
        ];
        let cross_norm = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
        let dot = ax * bx + ay * by + az * bz;
        cross_norm.atan2(dot)
    }
}

/// Great-circle distance between two degree points, in metres.
pub fn great_circle_distance_m(a: Point<f64>, b: Point<f64>) -> f64 {
    SphericalPoint::from_point(a).angle_to(&SphericalPoint::from_point(b)) * EARTH_RADIUS_M
}
