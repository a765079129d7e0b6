//! Fixed-radius near-duplicate elimination over an adaptive grid index.
//!
//! Pairwise comparison is quadratic in the number of points; bucketing
//! retained points into cells slightly larger than the search radius means
//! any retained point within the radius of a candidate lives in the
//! candidate's own cell or one of its 8 neighbors, so each candidate costs
//! a 3x3 probe instead of a full scan.

use crate::geodesy::{grid_cell, haversine_distance};
use geo::Point;
use indicatif::ProgressBar;
use std::collections::HashMap;
use tracing::info;

/// Grid cells are sized `GRID_FACTOR x` the query radius. Cells at least
/// as large as the radius keep every pair within the radius inside the
/// 3x3 neighborhood; the extra margin covers the uneven longitude cell
/// widths that come from using each point's own latitude.
const GRID_FACTOR: f64 = 1.5;

/// Bucket index over integer grid cells, keyed by a fixed cell size.
///
/// Only an index: membership of a cell says nothing about distance, every
/// candidate is confirmed with an exact haversine check.
pub struct GridIndex {
    cell_size_m: f64,
    buckets: HashMap<(i64, i64), Vec<Point<f64>>>,
}

impl GridIndex {
    pub fn new(cell_size_m: f64) -> Self {
        GridIndex {
            cell_size_m,
            buckets: HashMap::new(),
        }
    }

    fn cell_of(&self, point: Point<f64>) -> (i64, i64) {
        grid_cell(point, self.cell_size_m)
    }

    /// Whether any indexed point lies within `radius_m` of `point`,
    /// scanning the 3x3 cell neighborhood.
    pub fn has_within(&self, point: Point<f64>, radius_m: f64) -> bool {
        let (cell_lat, cell_lon) = self.cell_of(point);
        for d_lat in -1..=1 {
            for d_lon in -1..=1 {
                if let Some(bucket) = self.buckets.get(&(cell_lat + d_lat, cell_lon + d_lon)) {
                    if bucket
                        .iter()
                        .any(|&existing| haversine_distance(point, existing) <= radius_m)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn insert(&mut self, point: Point<f64>) {
        let cell = self.cell_of(point);
        self.buckets.entry(cell).or_default().push(point);
    }
}

/// Deduplication algorithm, selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Optimization {
    /// Grid-indexed near-linear dedup.
    Fast,
    /// Exhaustive pairwise dedup, kept for verification runs.
    Exact,
}

impl std::fmt::Display for Optimization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Optimization::Fast => write!(f, "fast"),
            Optimization::Exact => write!(f, "exact"),
        }
    }
}

/// Removes every point that has an earlier retained point within
/// `min_distance_m`, preserving first-seen order.
pub fn deduplicate(
    points: &[Point<f64>],
    min_distance_m: f64,
    optimization: Optimization,
) -> Vec<Point<f64>> {
    match optimization {
        Optimization::Fast => deduplicate_grid(points, min_distance_m),
        Optimization::Exact => deduplicate_exact(points, min_distance_m),
    }
}

fn deduplicate_grid(points: &[Point<f64>], min_distance_m: f64) -> Vec<Point<f64>> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut index = GridIndex::new(min_distance_m * GRID_FACTOR);
    let mut unique = Vec::new();

    let progress = ProgressBar::new(points.len() as u64);
    for &point in points {
        if !index.has_within(point, min_distance_m) {
            index.insert(point);
            unique.push(point);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    unique
}

fn deduplicate_exact(points: &[Point<f64>], min_distance_m: f64) -> Vec<Point<f64>> {
    let mut unique: Vec<Point<f64>> = Vec::new();

    let progress = ProgressBar::new(points.len() as u64);
    for &point in points {
        let is_duplicate = unique
            .iter()
            .any(|&existing| haversine_distance(point, existing) <= min_distance_m);
        if !is_duplicate {
            unique.push(point);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    unique
}

#[derive(Debug)]
pub struct DedupStats {
    pub original_count: usize,
    pub final_count: usize,
    pub removed_count: usize,
    pub removal_percentage: f64,
}

impl DedupStats {
    pub fn new(original_count: usize, final_count: usize) -> Self {
        let removed_count = original_count - final_count;
        let removal_percentage = if original_count == 0 {
            0.0
        } else {
            (removed_count as f64 / original_count as f64) * 100.0
        };
        DedupStats {
            original_count,
            final_count,
            removed_count,
            removal_percentage,
        }
    }

    pub fn log(&self) {
        info!(
            "removed {} duplicate points ({:.2}% reduction), {} remain",
            self.removed_count, self.removal_percentage, self.final_count
        );
    }
}
