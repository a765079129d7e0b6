//! Output data model: track-type table, run metrics and the root dataset
//! aggregate written to the cache.

use crate::geometry::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version tag embedded in every artifact.
pub const DATASET_VERSION: &str = "3.0";

/// Travel mode a track directory belongs to. Fixed process-wide set; the
/// per-type rendering configuration is a static lookup, not data-driven.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Road,
    Train,
    Plane,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Points,
    Lines,
}

impl TrackType {
    pub const ALL: [TrackType; 4] = [
        TrackType::Road,
        TrackType::Train,
        TrackType::Plane,
        TrackType::Other,
    ];

    /// Input subdirectory name under the data directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            TrackType::Road => "road",
            TrackType::Train => "train",
            TrackType::Plane => "plane",
            TrackType::Other => "other",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TrackType::Road => "#ef4444",
            TrackType::Train => "#10b981",
            TrackType::Plane => "#3b82f6",
            TrackType::Other => "#f59e0b",
        }
    }

    pub fn display_type(self) -> DisplayType {
        match self {
            TrackType::Road => DisplayType::Points,
            _ => DisplayType::Lines,
        }
    }
}

/// Scalar results of the explored-area calculation over road tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub calculation_time: String,
    pub total_files: usize,
    pub total_points: usize,
    pub unique_points: usize,
    pub grid_cells: usize,
    pub grid_size_meters: f64,
    pub explored_area_km2: f64,
    pub earth_percentage: f64,
    pub calculation_method: String,
    pub files: Vec<String>,
}

/// Bounding box over every emitted coordinate, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Per-track-type geometry layers plus the static metadata a consumer
/// needs to render them standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackData {
    pub color: String,
    pub display_type: DisplayType,
    pub files: Vec<String>,
    pub points: FeatureCollection,
    pub points_count: usize,
    pub lines: FeatureCollection,
    pub lines_count: usize,
}

impl TrackData {
    /// An empty layer set still carrying the type's rendering metadata.
    pub fn empty(track_type: TrackType) -> Self {
        TrackData {
            color: track_type.color().to_string(),
            display_type: track_type.display_type(),
            files: Vec::new(),
            points: FeatureCollection::empty(),
            points_count: 0,
            lines: FeatureCollection::empty(),
            lines_count: 0,
        }
    }
}

/// Identifies one chunk of a partitioned dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub chunk_id: usize,
    pub total_chunks: usize,
    pub track_types: Vec<TrackType>,
}

/// Root aggregate for one run. Built incrementally during geometry
/// building, immutable once handed to the cache partitioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub metrics: Metrics,
    pub bounds: Option<Bounds>,
    pub generated_at: String,
    pub version: String,
    pub tracks: BTreeMap<TrackType, TrackData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_info: Option<ChunkInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_types_serialize_as_lowercase_keys() {
        let mut tracks = BTreeMap::new();
        tracks.insert(TrackType::Road, TrackData::empty(TrackType::Road));
        let json = serde_json::to_string(&tracks).unwrap();
        assert!(json.contains("\"road\""));
        assert!(json.contains("\"#ef4444\""));
        assert!(json.contains("\"points\""));
    }

    #[test]
    fn road_renders_points_others_render_lines() {
        assert_eq!(TrackType::Road.display_type(), DisplayType::Points);
        for t in [TrackType::Train, TrackType::Plane, TrackType::Other] {
            assert_eq!(t.display_type(), DisplayType::Lines);
        }
    }

    #[test]
    fn chunk_info_is_omitted_when_absent() {
        let dataset = Dataset {
            metrics: Metrics {
                calculation_time: "2026-01-01T00:00:00Z".to_string(),
                total_files: 0,
                total_points: 0,
                unique_points: 0,
                grid_cells: 0,
                grid_size_meters: 50.0,
                explored_area_km2: 0.0,
                earth_percentage: 0.0,
                calculation_method: "grid_based".to_string(),
                files: Vec::new(),
            },
            bounds: None,
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            version: DATASET_VERSION.to_string(),
            tracks: BTreeMap::new(),
            chunk_info: None,
        };
        let json = serde_json::to_string(&dataset).unwrap();
        assert!(!json.contains("chunk_info"));
    }
}
