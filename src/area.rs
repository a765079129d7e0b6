//! Explored-area estimation by grid cell coverage.
//!
//! Each point claims the fixed-size ground cell it falls into; the union of
//! claimed cells approximates the explored surface. Coarse cells undercount
//! the true swept area, so accuracy tracks the cell size parameter.

use crate::geodesy::grid_cell;
use geo::Point;
use std::collections::HashSet;

/// Earth's total surface area in square meters.
pub const EARTH_SURFACE_AREA_M2: f64 = 5.10072e14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaEstimate {
    pub cell_count: usize,
    pub area_m2: f64,
}

impl AreaEstimate {
    pub fn area_km2(&self) -> f64 {
        self.area_m2 / 1e6
    }

    /// Share of Earth's surface, in percent.
    pub fn earth_percentage(&self) -> f64 {
        self.area_m2 / EARTH_SURFACE_AREA_M2 * 100.0
    }
}

/// Counts the distinct `grid_size_m` cells touched by `points` and the
/// implied covered area. Empty input yields a zero estimate.
pub fn estimate_area(points: &[Point<f64>], grid_size_m: f64) -> AreaEstimate {
    let cells: HashSet<(i64, i64)> = points
        .iter()
        .map(|&point| grid_cell(point, grid_size_m))
        .collect();

    AreaEstimate {
        cell_count: cells.len(),
        area_m2: cells.len() as f64 * grid_size_m * grid_size_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero_area() {
        let estimate = estimate_area(&[], 50.0);
        assert_eq!(estimate.cell_count, 0);
        assert_eq!(estimate.area_m2, 0.0);
    }

    #[test]
    fn two_nearby_points_occupy_one_cell() {
        // ~10m apart, 50m grid
        let points = vec![Point::new(10.0, 45.0), Point::new(10.0, 45.00009)];
        let estimate = estimate_area(&points, 50.0);
        assert_eq!(estimate.cell_count, 1);
        assert_eq!(estimate.area_m2, 2500.0);

        let expected_pct = 2500.0 / EARTH_SURFACE_AREA_M2 * 100.0;
        assert!((estimate.earth_percentage() - expected_pct).abs() < 1e-18);
    }

    #[test]
    fn duplicate_points_do_not_grow_the_estimate() {
        let point = Point::new(10.0, 45.0);
        let one = estimate_area(&[point], 50.0);
        let many = estimate_area(&[point; 10], 50.0);
        assert_eq!(one, many);
    }

    #[test]
    fn estimate_grows_with_distinct_cells() {
        let mut points = vec![Point::new(10.0, 45.0)];
        let mut last = estimate_area(&points, 50.0).cell_count;
        for i in 1..5 {
            // ~111m per step, each lands in a new 50m cell
            points.push(Point::new(10.0, 45.0 + i as f64 * 0.001));
            let count = estimate_area(&points, 50.0).cell_count;
            assert!(count > last);
            last = count;
        }
    }

    #[test]
    fn area_scales_with_cell_size() {
        let points = vec![Point::new(10.0, 45.0)];
        assert_eq!(estimate_area(&points, 100.0).area_m2, 10_000.0);
        assert_eq!(estimate_area(&points, 25.0).area_m2, 625.0);
    }
}
