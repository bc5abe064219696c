use airspace_shared::{GeoPoint, EARTH_RADIUS_KM};
use glam::DVec2;

/// Normalize an angle in degrees to `[-180, 180)`.
///
/// Values already in range are returned untouched, which makes the function
/// idempotent bit for bit.
#[inline]
pub fn wrap_180(deg: f64) -> f64 {
    if (-180.0..180.0).contains(&deg) {
        return deg;
    }
    let x = (deg + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid may round up to the modulus for tiny negative inputs
    if x >= 180.0 {
        -180.0
    } else {
        x
    }
}

/// Normalize an angle in degrees to `[0, 360)`.
#[inline]
pub fn normalize_360(deg: f64) -> f64 {
    let x = deg.rem_euclid(360.0);
    if x >= 360.0 {
        0.0
    } else {
        x
    }
}

/// Great-circle destination from `origin` after `distance_km` along `bearing_deg`.
pub fn point_at_distance(origin: GeoPoint, distance_km: f64, bearing_deg: f64) -> GeoPoint {
    point_at_distance_on_sphere(origin, distance_km, bearing_deg, EARTH_RADIUS_KM)
}

pub fn point_at_distance_on_sphere(
    origin: GeoPoint,
    distance_km: f64,
    bearing_deg: f64,
    radius_km: f64,
) -> GeoPoint {
    if distance_km == 0.0 {
        return origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let a = bearing_deg.to_radians();
    let delta = distance_km / radius_km;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * a.cos()).asin();
    let lon2 = lon1
        + f64::atan2(
            a.sin() * delta.sin() * lat1.cos(),
            delta.cos() - lat1.sin() * lat2.sin(),
        );

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Destinations for several bearings at the same distance, in bearing order.
pub fn points_at_distance(origin: GeoPoint, distance_km: f64, bearings_deg: &[f64]) -> Vec<GeoPoint> {
    bearings_deg
        .iter()
        .map(|&b| point_at_distance(origin, distance_km, b))
        .collect()
}

/// Initial great-circle bearing (degrees, `[0, 360)`) and haversine distance (km)
/// from `from` to `to`.
pub fn bearing_and_distance(from: GeoPoint, to: GeoPoint) -> (f64, f64) {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (to.lon - from.lon).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let bearing = normalize_360(f64::atan2(y, x).to_degrees());

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let distance = 2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin();

    (bearing, distance)
}

/// Planar (east, north) frame in meters around a fixed center.
///
/// Only meaningful for distances that are small compared to the earth radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    center: GeoPoint,
}

impl LocalFrame {
    pub fn new(center: GeoPoint) -> Self {
        Self { center }
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    /// Project a geographic position into the frame.
    pub fn project(&self, p: GeoPoint) -> DVec2 {
        let (bearing, distance_km) = bearing_and_distance(self.center, p);
        let b = bearing.to_radians();
        DVec2::new(b.sin(), b.cos()) * (distance_km * 1000.0)
    }

    /// Inverse of [`LocalFrame::project`].
    pub fn unproject(&self, xy: DVec2) -> GeoPoint {
        let bearing = normalize_360(f64::atan2(xy.x, xy.y).to_degrees());
        point_at_distance(self.center, xy.length() / 1000.0, bearing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_wrap_180_reference_values() {
        assert_eq!(wrap_180(180.0), -180.0);
        assert_eq!(wrap_180(-180.0), -180.0);
        assert_eq!(wrap_180(370.0), 10.0);
        assert_eq!(wrap_180(340.0), -20.0);
        assert_eq!(wrap_180(-190.0), 170.0);
        assert_eq!(wrap_180(0.0), 0.0);
        assert_eq!(wrap_180(720.0), 0.0);
    }

    #[test]
    fn test_wrap_180_range_and_idempotence() {
        let mut x = -10_000.0;
        while x < 10_000.0 {
            let w = wrap_180(x);
            assert!((-180.0..180.0).contains(&w), "wrap_180({x}) = {w}");
            assert_eq!(wrap_180(w), w);
            x += 7.3;
        }
        for x in [-1e-300, 1e-300, -1e-17, 179.99999999999997, -180.00000000000003] {
            let w = wrap_180(x);
            assert!((-180.0..180.0).contains(&w), "wrap_180({x}) = {w}");
            assert_eq!(wrap_180(w), w);
        }
    }

    #[test]
    fn test_normalize_360() {
        assert_eq!(normalize_360(-10.0), 350.0);
        assert_eq!(normalize_360(360.0), 0.0);
        assert_eq!(normalize_360(725.0), 5.0);
    }

    #[test]
    fn test_zero_distance_returns_origin() {
        let origin = GeoPoint::new(52.0, 4.0);
        assert_eq!(point_at_distance(origin, 0.0, 123.0), origin);
    }

    #[test]
    fn test_point_due_north() {
        let origin = GeoPoint::new(52.0, 4.0);
        let p = point_at_distance(origin, 111.19492664455873, 0.0);
        assert!((p.lat - 53.0).abs() < 1e-6);
        assert!((p.lon - 4.0).abs() < EPS);
    }

    #[test]
    fn test_points_at_distance_parallel() {
        let origin = GeoPoint::new(52.3, 4.76);
        let bearings = [0.0, 90.0, 180.0, 270.0];
        let points = points_at_distance(origin, 300.0, &bearings);
        assert_eq!(points.len(), 4);
        for (p, b) in points.iter().zip(bearings) {
            let (brg, dist) = bearing_and_distance(origin, *p);
            assert!((dist - 300.0).abs() < 1e-6);
            assert!(wrap_180(brg - b).abs() < 1e-6, "bearing {brg} vs {b}");
        }
        assert!(points[0].lat > origin.lat);
        assert!(points[1].lon > origin.lon);
        assert!(points[2].lat < origin.lat);
        assert!(points[3].lon < origin.lon);
    }

    #[test]
    fn test_bearing_and_distance_inverts_destination() {
        let origin = GeoPoint::new(51.99, 4.37);
        for bearing in [10.0, 75.0, 160.0, 200.0, 300.0] {
            let p = point_at_distance(origin, 42.0, bearing);
            let (brg, dist) = bearing_and_distance(origin, p);
            assert!((brg - bearing).abs() < 1e-6);
            assert!((dist - 42.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_local_plane_roundtrip() {
        let frame = LocalFrame::new(GeoPoint::new(52.0, 4.0));
        for p in [
            GeoPoint::new(52.01, 4.0),
            GeoPoint::new(51.9, 4.2),
            GeoPoint::new(52.3, 3.7),
            GeoPoint::new(51.95, 3.99),
        ] {
            let xy = frame.project(p);
            let bearing = normalize_360(f64::atan2(xy.x, xy.y).to_degrees());
            let distance_km = xy.length() / 1000.0;
            let (expected_brg, expected_dist) = bearing_and_distance(frame.center(), p);
            assert!((bearing - expected_brg).abs() < 1e-9);
            assert!((distance_km - expected_dist).abs() < 1e-9);

            let back = frame.unproject(xy);
            assert!((back.lat - p.lat).abs() < 1e-9);
            assert!((back.lon - p.lon).abs() < 1e-9);
        }
    }

    #[test]
    fn test_project_axes() {
        let center = GeoPoint::new(52.0, 4.0);
        let frame = LocalFrame::new(center);
        let north = frame.project(GeoPoint::new(52.01, 4.0));
        assert!(north.x.abs() < 1e-6);
        assert!((north.y - 1111.9492664455873).abs() < 1e-3);

        let east = frame.project(point_at_distance(center, 1.0, 90.0));
        assert!((east.x - 1000.0).abs() < 1e-6);
        assert!(east.y.abs() < 1e-6);
    }
}
