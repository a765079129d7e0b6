mod area;
mod cache;
mod dataset;
mod error;
mod geodesy;
mod geometry;
mod grid;
mod ingest;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use crate::area::estimate_area;
use crate::cache::{Manifest, PartitionConfig, write_cache};
use crate::dataset::{DATASET_VERSION, Dataset, Metrics, TrackType};
use crate::error::CacheError;
use crate::geometry::{BoundsTracker, TrackLayer, build_track_layer};
use crate::grid::Optimization;
use crate::ingest::{TrackFile, parse_directory};

/// Preprocesses GPX track files into map cache artifacts: explored-area
/// metrics over a spatial grid plus per-type track geometry, partitioned
/// to stay under a byte budget for static hosting.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input root with one subdirectory per track type (road, train, plane, other)
    #[arg(long, default_value = "GPX")]
    data_dir: PathBuf,

    /// Output directory for cache artifacts
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Deduplication algorithm
    #[arg(long, value_enum, default_value_t = Optimization::Fast)]
    optimization: Optimization,

    /// Near-duplicate elimination threshold in meters
    #[arg(long, default_value_t = 50.0)]
    min_distance_m: f64,

    /// Grid cell size for area estimation, in meters
    #[arg(long, default_value_t = 50.0)]
    grid_size_m: f64,

    /// Byte budget per artifact, in MB
    #[arg(long, default_value_t = 20.0)]
    max_size_mb: f64,

    /// Target chunk size when partitioning, in MB
    #[arg(long, default_value_t = 10.0)]
    chunk_size_mb: f64,

    /// Always emit a single artifact regardless of size
    #[arg(long)]
    no_chunking: bool,

    /// Emit plain JSON instead of gzip-compressed artifacts
    #[arg(long)]
    no_compress: bool,
}

impl Args {
    fn partition_config(&self) -> PartitionConfig {
        PartitionConfig {
            max_artifact_bytes: (self.max_size_mb * 1024.0 * 1024.0) as u64,
            target_chunk_bytes: (self.chunk_size_mb * 1024.0 * 1024.0) as u64,
            compress: !self.no_compress,
            chunking_enabled: !self.no_chunking,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), CacheError> {
    let inputs: BTreeMap<TrackType, Vec<TrackFile>> = TrackType::ALL
        .into_iter()
        .map(|track_type| {
            let dir = args.data_dir.join(track_type.dir_name());
            (track_type, parse_directory(&dir))
        })
        .collect();

    // Road is required: the explored-area metrics are computed from it.
    let road_files = &inputs[&TrackType::Road];
    let road_point_total: usize = road_files.iter().map(TrackFile::point_count).sum();
    if road_files.is_empty() || road_point_total == 0 {
        return Err(CacheError::EmptyInput {
            track_type: TrackType::Road.dir_name(),
            dir: args.data_dir.join(TrackType::Road.dir_name()),
        });
    }

    let mut bounds = BoundsTracker::new();
    let mut tracks = BTreeMap::new();
    let mut metrics = None;

    for track_type in TrackType::ALL {
        info!("building {} layers", track_type.dir_name());
        let layer = build_track_layer(
            track_type,
            &inputs[&track_type],
            args.min_distance_m,
            args.optimization,
            &mut bounds,
        );

        if track_type == TrackType::Road {
            metrics = Some(road_metrics(args, road_files, &layer));
        }
        tracks.insert(track_type, layer.data);
    }
    let metrics = metrics.expect("road layer is always built");

    let dataset = Dataset {
        metrics,
        bounds: bounds.finish(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        version: DATASET_VERSION.to_string(),
        tracks,
        chunk_info: None,
    };

    fs::create_dir_all(&args.cache_dir).map_err(|source| CacheError::Write {
        path: args.cache_dir.clone(),
        source,
    })?;

    let metrics_path = args.cache_dir.join("metrics.json");
    let metrics_json = serde_json::to_vec_pretty(&dataset.metrics)?;
    fs::write(&metrics_path, &metrics_json).map_err(|source| CacheError::Write {
        path: metrics_path,
        source,
    })?;
    info!("wrote metrics.json");

    let manifest = write_cache(&dataset, &args.cache_dir, &args.partition_config())?;
    log_summary(&dataset, &manifest);

    Ok(())
}

fn road_metrics(args: &Args, road_files: &[TrackFile], layer: &TrackLayer) -> Metrics {
    let estimate = estimate_area(&layer.unique_points, args.grid_size_m);
    info!(
        "explored area: {} cells, {:.6} km2, {:.12}% of Earth",
        estimate.cell_count,
        estimate.area_km2(),
        estimate.earth_percentage()
    );

    Metrics {
        calculation_time: chrono::Utc::now().to_rfc3339(),
        total_files: road_files.len(),
        total_points: layer.raw_point_count,
        unique_points: layer.unique_points.len(),
        grid_cells: estimate.cell_count,
        grid_size_meters: args.grid_size_m,
        explored_area_km2: (estimate.area_km2() * 1e6).round() / 1e6,
        earth_percentage: estimate.earth_percentage(),
        calculation_method: "grid_based".to_string(),
        files: road_files.iter().map(|f| f.name.clone()).collect(),
    }
}

fn log_summary(dataset: &Dataset, manifest: &Manifest) {
    for (track_type, data) in &dataset.tracks {
        info!(
            "{}: {} files, {} points, {} lines",
            track_type.dir_name(),
            data.files.len(),
            data.points_count,
            data.lines_count
        );
    }
    if let Some(bounds) = &dataset.bounds {
        info!(
            "bounds: lng {:.4}..{:.4}, lat {:.4}..{:.4}",
            bounds.min_lng, bounds.max_lng, bounds.min_lat, bounds.max_lat
        );
    }
    match manifest {
        Manifest::Single {
            single_file,
            total_size_mb,
            ..
        } => {
            info!("cache: single file {single_file} ({total_size_mb:.2} MB)");
        }
        Manifest::Chunked {
            total_chunks,
            total_size_mb,
            ..
        } => {
            info!("cache: {total_chunks} chunks ({total_size_mb:.2} MB total)");
        }
    }
}
