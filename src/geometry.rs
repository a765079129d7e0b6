//! GeoJSON-shaped feature model and per-track-type layer building.
//!
//! Coordinates are `[longitude, latitude]` throughout, matching what the
//! map front-end consumes.

use crate::dataset::{TrackData, TrackType};
use crate::ingest::TrackFile;
use crate::grid::{self, DedupStats, Optimization};
use geo::Point;
use serde::{Deserialize, Serialize};

/// Consecutive longitudes further apart than this indicate the segment
/// crosses the antimeridian rather than spanning the map.
const DATELINE_THRESHOLD_DEG: f64 = 180.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub track_type: TrackType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn point(point: Point<f64>, track_type: TrackType) -> Self {
        Feature {
            feature_type: "Feature".to_string(),
            geometry: Geometry::Point {
                coordinates: [point.x(), point.y()],
            },
            properties: FeatureProperties { track_type },
        }
    }

    pub fn line(coordinates: Vec<[f64; 2]>, track_type: TrackType) -> Self {
        Feature {
            feature_type: "Feature".to_string(),
            geometry: Geometry::LineString { coordinates },
            properties: FeatureProperties { track_type },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Splits a coordinate run at every dateline crossing.
///
/// Each crossing closes the current line and starts a new one at the far
/// side, so no emitted line ever wraps around the globe. Pieces left with
/// fewer than 2 points are discarded.
pub fn split_dateline(coordinates: &[[f64; 2]]) -> Vec<Vec<[f64; 2]>> {
    let mut lines = Vec::new();
    let Some(&first) = coordinates.first() else {
        return lines;
    };

    let mut current = vec![first];
    for window in coordinates.windows(2) {
        let (prev, curr) = (window[0], window[1]);
        if (curr[0] - prev[0]).abs() > DATELINE_THRESHOLD_DEG {
            if current.len() >= 2 {
                lines.push(current);
            }
            current = vec![curr];
        } else {
            current.push(curr);
        }
    }
    if current.len() >= 2 {
        lines.push(current);
    }

    lines
}

/// Running min/max accumulator over emitted coordinates.
#[derive(Debug, Clone, Copy)]
pub struct BoundsTracker {
    min_lng: f64,
    max_lng: f64,
    min_lat: f64,
    max_lat: f64,
    seen: bool,
}

impl BoundsTracker {
    pub fn new() -> Self {
        BoundsTracker {
            min_lng: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            seen: false,
        }
    }

    pub fn update(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.max_lng = self.max_lng.max(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.seen = true;
    }

    pub fn finish(&self) -> Option<crate::dataset::Bounds> {
        self.seen.then(|| crate::dataset::Bounds {
            min_lng: self.min_lng,
            max_lng: self.max_lng,
            min_lat: self.min_lat,
            max_lat: self.max_lat,
        })
    }
}

/// Geometry layers built for one track type.
pub struct TrackLayer {
    pub data: TrackData,
    /// Deduplicated raw points behind the point layer. For road this is
    /// the canonical input to the area estimator.
    pub unique_points: Vec<Point<f64>>,
    pub raw_point_count: usize,
}

/// Builds the point and line layers for one track type.
///
/// The point layer is deduplicated at `min_distance_m`; lines are built
/// from the raw segments since continuity matters more than sparsity
/// there. Every emitted coordinate feeds the shared bounds tracker.
pub fn build_track_layer(
    track_type: TrackType,
    files: &[TrackFile],
    min_distance_m: f64,
    optimization: Optimization,
    bounds: &mut BoundsTracker,
) -> TrackLayer {
    let raw_points: Vec<Point<f64>> = files
        .iter()
        .flat_map(|file| file.segments.iter().flatten().copied())
        .collect();
    let raw_point_count = raw_points.len();

    let unique_points = grid::deduplicate(&raw_points, min_distance_m, optimization);
    DedupStats::new(raw_point_count, unique_points.len()).log();

    let mut point_features = Vec::with_capacity(unique_points.len());
    for &point in &unique_points {
        bounds.update(point.x(), point.y());
        point_features.push(Feature::point(point, track_type));
    }

    let mut line_features = Vec::new();
    for file in files {
        for segment in &file.segments {
            if segment.len() < 2 {
                continue;
            }
            let coordinates: Vec<[f64; 2]> =
                segment.iter().map(|p| [p.x(), p.y()]).collect();
            for piece in split_dateline(&coordinates) {
                for &[lng, lat] in &piece {
                    bounds.update(lng, lat);
                }
                line_features.push(Feature::line(piece, track_type));
            }
        }
    }

    let data = TrackData {
        color: track_type.color().to_string(),
        display_type: track_type.display_type(),
        files: files.iter().map(|f| f.name.clone()).collect(),
        points_count: point_features.len(),
        points: FeatureCollection::new(point_features),
        lines_count: line_features.len(),
        lines: FeatureCollection::new(line_features),
    };

    TrackLayer {
        data,
        unique_points,
        raw_point_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(coords: &[(f64, f64)]) -> Vec<Point<f64>> {
        coords.iter().map(|&(lng, lat)| Point::new(lng, lat)).collect()
    }

    #[test]
    fn point_feature_uses_lon_lat_order() {
        let feature = Feature::point(Point::new(13.405, 52.52), TrackType::Road);
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["type"], "Feature");
        assert_eq!(json["geometry"]["type"], "Point");
        assert_eq!(json["geometry"]["coordinates"][0], 13.405);
        assert_eq!(json["geometry"]["coordinates"][1], 52.52);
        assert_eq!(json["properties"]["track_type"], "road");
    }

    #[test]
    fn ordinary_segment_stays_one_line() {
        let coords = [[13.0, 52.0], [13.1, 52.1], [13.2, 52.2]];
        let lines = split_dateline(&coords);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], coords.to_vec());
    }

    #[test]
    fn dateline_crossing_splits_the_line() {
        let coords = [[178.0, 10.0], [179.0, 10.0], [-179.0, 10.0], [-178.0, 10.0]];
        let lines = split_dateline(&coords);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![[178.0, 10.0], [179.0, 10.0]]);
        assert_eq!(lines[1], vec![[-179.0, 10.0], [-178.0, 10.0]]);
    }

    #[test]
    fn two_point_crossing_discards_both_halves() {
        // Both pieces end up single-point and are dropped
        let coords = [[179.0, 10.0], [-179.0, 10.0]];
        assert!(split_dateline(&coords).is_empty());
    }

    #[test]
    fn empty_run_yields_no_lines() {
        assert!(split_dateline(&[]).is_empty());
        assert!(split_dateline(&[[1.0, 2.0]]).is_empty());
    }

    #[test]
    fn bounds_track_every_coordinate() {
        let mut tracker = BoundsTracker::new();
        assert!(tracker.finish().is_none());
        tracker.update(13.0, 52.0);
        tracker.update(-10.0, 60.0);
        let bounds = tracker.finish().unwrap();
        assert_eq!(bounds.min_lng, -10.0);
        assert_eq!(bounds.max_lng, 13.0);
        assert_eq!(bounds.min_lat, 52.0);
        assert_eq!(bounds.max_lat, 60.0);
    }

    #[test]
    fn layer_builder_deduplicates_points_but_not_lines() {
        let files = vec![TrackFile {
            name: "ride.gpx".to_string(),
            // Two points ~10m apart: one survives dedup, the line keeps both
            segments: vec![segment(&[(13.405, 52.52), (13.405, 52.52009)])],
        }];
        let mut bounds = BoundsTracker::new();
        let layer = build_track_layer(
            TrackType::Road,
            &files,
            50.0,
            Optimization::Fast,
            &mut bounds,
        );

        assert_eq!(layer.raw_point_count, 2);
        assert_eq!(layer.unique_points.len(), 1);
        assert_eq!(layer.data.points_count, 1);
        assert_eq!(layer.data.lines_count, 1);
        assert_eq!(layer.data.files, vec!["ride.gpx".to_string()]);
        match &layer.data.lines.features[0].geometry {
            Geometry::LineString { coordinates } => assert_eq!(coordinates.len(), 2),
            other => panic!("expected a line, got {other:?}"),
        }
    }

    #[test]
    fn dateline_segment_produces_no_line_features() {
        let files = vec![TrackFile {
            name: "flight.gpx".to_string(),
            segments: vec![segment(&[(179.0, 10.0), (-179.0, 10.0)])],
        }];
        let mut bounds = BoundsTracker::new();
        let layer = build_track_layer(
            TrackType::Plane,
            &files,
            50.0,
            Optimization::Fast,
            &mut bounds,
        );
        assert_eq!(layer.data.lines_count, 0);
        // The point layer still carries both shores
        assert_eq!(layer.data.points_count, 2);
    }
}
