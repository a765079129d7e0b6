//! Distance and degree/meter conversions on the WGS84 sphere.
//!
//! Points are carried as `geo::Point<f64>` with x = longitude and
//! y = latitude, both in degrees.

use geo::Point;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Ground distance of one degree of latitude, in meters.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Great-circle (haversine) distance between two points in meters.
pub fn haversine_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lon = (b.x() - a.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.y().to_radians().cos() * b.y().to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Ground distance of one degree of longitude at the given latitude.
///
/// Shrinks with `cos(latitude)`; at the poles this goes to zero, so cells
/// computed from it get uneven there. Documented limitation, not corrected.
pub fn meters_per_degree_lon(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE * lat_deg.to_radians().cos()
}

/// Maps a point to an integer grid cell of `cell_size_m` ground size.
///
/// Longitude cell width uses the point's own latitude, so the same cell
/// mapping serves both the dedup index and the area estimator.
pub fn grid_cell(point: Point<f64>, cell_size_m: f64) -> (i64, i64) {
    let cell_lat = (point.y() * METERS_PER_DEGREE / cell_size_m) as i64;
    let cell_lon = (point.x() * meters_per_degree_lon(point.y()) / cell_size_m) as i64;
    (cell_lat, cell_lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_one_degree_of_latitude() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 1.0);
        let d = haversine_distance(a, b);
        // One degree of latitude on a 6371 km sphere is ~111.19 km
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Point::new(13.405, 52.52);
        assert_eq!(haversine_distance(p, p), 0.0);
    }

    #[test]
    fn haversine_symmetric() {
        let a = Point::new(13.405, 52.52);
        let b = Point::new(2.3522, 48.8566);
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn longitude_scale_shrinks_with_latitude() {
        assert!(meters_per_degree_lon(60.0) < meters_per_degree_lon(0.0));
        assert!((meters_per_degree_lon(60.0) - METERS_PER_DEGREE * 0.5).abs() < 1.0);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        // ~10m apart in latitude, well inside one 50m cell
        let a = Point::new(10.0, 45.0);
        let b = Point::new(10.0, 45.00009);
        assert_eq!(grid_cell(a, 50.0), grid_cell(b, 50.0));
    }

    #[test]
    fn distant_points_get_distinct_cells() {
        let a = Point::new(10.0, 45.0);
        let b = Point::new(10.0, 45.01);
        assert_ne!(grid_cell(a, 50.0), grid_cell(b, 50.0));
    }
}
