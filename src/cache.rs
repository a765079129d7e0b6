//! Size-bounded cache emission.
//!
//! The full dataset is serialized once to learn its size. Within budget it
//! lands as a single artifact; over budget the feature set is flattened,
//! sliced into contiguous runs and written as self-describing chunks that
//! a reader reassembles by following the `data_config.json` manifest. The
//! manifest is the single source of truth: it only ever lists chunks that
//! actually landed on disk.

use crate::dataset::{ChunkInfo, Dataset, TrackData, TrackType};
use crate::error::CacheError;
use crate::geometry::{Feature, FeatureCollection};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_TARGET_CHUNK_BYTES: u64 = 10 * 1024 * 1024;

/// Chunk count bounds for the primary (feature-sliced) partitioning.
const MIN_CHUNKS: usize = 2;
const MAX_CHUNKS: usize = 20;

const BASE_FILENAME: &str = "tracks_data";
const MANIFEST_FILENAME: &str = "data_config.json";

#[derive(Debug, Clone)]
pub struct PartitionConfig {
    pub max_artifact_bytes: u64,
    pub target_chunk_bytes: u64,
    pub compress: bool,
    pub chunking_enabled: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
            target_chunk_bytes: DEFAULT_TARGET_CHUNK_BYTES,
            compress: true,
            chunking_enabled: true,
        }
    }
}

impl PartitionConfig {
    fn format(&self) -> String {
        if self.compress { "json.gz" } else { "json" }.to_string()
    }

    fn artifact_name(&self, base: &str) -> String {
        format!("{base}.{}", self.format())
    }
}

/// How the dataset was serialized; what a reader must load first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "lowercase")]
pub enum Manifest {
    Single {
        single_file: String,
        format: String,
        total_size_mb: f64,
        generated_at: String,
    },
    Chunked {
        chunks: Vec<ChunkEntry>,
        format: String,
        total_chunks: usize,
        total_size_mb: f64,
        chunk_size_mb: f64,
        generated_at: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub file: String,
    pub size_mb: f64,
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

/// Serializes `value` the way artifacts are written on disk, so measured
/// sizes match written sizes byte for byte.
fn encode<T: Serialize>(value: &T, compress: bool) -> Result<Vec<u8>, CacheError> {
    let json = serde_json::to_vec_pretty(value)?;
    if !compress {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    fs::write(path, bytes).map_err(|source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the dataset plus its manifest into `cache_dir`, choosing single
/// or chunked emission by the configured byte budget.
pub fn write_cache(
    dataset: &Dataset,
    cache_dir: &Path,
    config: &PartitionConfig,
) -> Result<Manifest, CacheError> {
    fs::create_dir_all(cache_dir).map_err(|source| CacheError::Write {
        path: cache_dir.to_path_buf(),
        source,
    })?;

    let encoded = encode(dataset, config.compress)?;
    let total_size = encoded.len() as u64;
    info!("dataset size: {:.2} MB", mb(total_size));

    let manifest = if !config.chunking_enabled || total_size <= config.max_artifact_bytes {
        let filename = config.artifact_name(BASE_FILENAME);
        write_bytes(&cache_dir.join(&filename), &encoded)?;
        info!("wrote single artifact {filename}");
        Manifest::Single {
            single_file: filename,
            format: config.format(),
            total_size_mb: mb(total_size),
            generated_at: dataset.generated_at.clone(),
        }
    } else {
        info!(
            "dataset exceeds {:.2} MB budget, chunking",
            mb(config.max_artifact_bytes)
        );
        write_chunked(dataset, cache_dir, config, total_size)?
    };

    // The manifest is the reader's entry point and is never compressed.
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;
    write_bytes(&cache_dir.join(MANIFEST_FILENAME), &manifest_json)?;
    info!("wrote manifest {MANIFEST_FILENAME}");

    Ok(manifest)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerKind {
    Points,
    Lines,
}

struct FlatFeature<'a> {
    track_type: TrackType,
    layer: LayerKind,
    feature: &'a Feature,
}

/// Flattens every feature across types and layers into one ordered list.
/// `BTreeMap` iteration keeps the order deterministic run to run.
fn flatten(dataset: &Dataset) -> Vec<FlatFeature<'_>> {
    let mut flat = Vec::new();
    for (&track_type, data) in &dataset.tracks {
        for feature in &data.points.features {
            flat.push(FlatFeature {
                track_type,
                layer: LayerKind::Points,
                feature,
            });
        }
        for feature in &data.lines.features {
            flat.push(FlatFeature {
                track_type,
                layer: LayerKind::Lines,
                feature,
            });
        }
    }
    flat
}

/// Re-groups one slice of flattened features into a self-describing chunk
/// dataset carrying the shared metrics/bounds and the per-type rendering
/// metadata. `total_chunks` starts at 0 and is fixed up in a second pass.
fn assemble_chunk(dataset: &Dataset, slice: &[FlatFeature<'_>], chunk_id: usize) -> Dataset {
    let mut tracks: BTreeMap<TrackType, TrackData> = BTreeMap::new();
    for flat in slice {
        let entry = tracks.entry(flat.track_type).or_insert_with(|| {
            let full = &dataset.tracks[&flat.track_type];
            TrackData {
                color: full.color.clone(),
                display_type: full.display_type,
                files: full.files.clone(),
                points: FeatureCollection::empty(),
                points_count: 0,
                lines: FeatureCollection::empty(),
                lines_count: 0,
            }
        });
        match flat.layer {
            LayerKind::Points => {
                entry.points.features.push(flat.feature.clone());
                entry.points_count += 1;
            }
            LayerKind::Lines => {
                entry.lines.features.push(flat.feature.clone());
                entry.lines_count += 1;
            }
        }
    }

    let track_types = tracks.keys().copied().collect();
    Dataset {
        metrics: dataset.metrics.clone(),
        bounds: dataset.bounds,
        generated_at: dataset.generated_at.clone(),
        version: dataset.version.clone(),
        tracks,
        chunk_info: Some(ChunkInfo {
            chunk_id,
            total_chunks: 0,
            track_types,
        }),
    }
}

fn write_chunked(
    dataset: &Dataset,
    cache_dir: &Path,
    config: &PartitionConfig,
    total_size: u64,
) -> Result<Manifest, CacheError> {
    let flat = flatten(dataset);
    if flat.is_empty() {
        // Nothing to slice by feature; fall back to per-type chunks.
        return write_fallback_chunks(dataset, cache_dir, config, total_size);
    }

    let by_size = total_size.div_ceil(config.target_chunk_bytes) as usize;
    let target_count = by_size.clamp(MIN_CHUNKS, MAX_CHUNKS);
    let chunk_len = flat.len().div_ceil(target_count);
    info!(
        "slicing {} features into ~{} chunks of {} features",
        flat.len(),
        target_count,
        chunk_len
    );

    // First pass: write each chunk with a placeholder total. The real
    // total is not knowable until the slicing loop completes.
    let mut written: Vec<(String, Dataset)> = Vec::new();
    for (chunk_id, slice) in flat.chunks(chunk_len).enumerate() {
        let chunk = assemble_chunk(dataset, slice, chunk_id);
        let filename = config.artifact_name(&format!("{BASE_FILENAME}_chunk_{chunk_id}"));
        let encoded = encode(&chunk, config.compress)?;
        let path = cache_dir.join(&filename);
        match write_bytes(&path, &encoded) {
            Ok(()) => written.push((filename, chunk)),
            Err(e) => {
                warn!("dropping chunk {chunk_id}: {e}");
                let _ = fs::remove_file(&path);
            }
        }
    }

    // Second pass: rewrite every landed chunk with the final count. A
    // failed rewrite drops that chunk from disk and shrinks the count,
    // so repeat until the survivor set is stable; embedded totals then
    // always agree with the manifest.
    let mut pending = written;
    let entries = loop {
        let total_chunks = pending.len();
        let mut survivors = Vec::new();
        let mut entries = Vec::new();
        for (filename, mut chunk) in pending {
            if let Some(info) = chunk.chunk_info.as_mut() {
                info.total_chunks = total_chunks;
            }
            let encoded = encode(&chunk, config.compress)?;
            let path = cache_dir.join(&filename);
            match write_bytes(&path, &encoded) {
                Ok(()) => {
                    let size = encoded.len() as u64;
                    if size > config.max_artifact_bytes {
                        warn!(
                            "chunk {filename} is {:.2} MB, over the {:.2} MB budget",
                            mb(size),
                            mb(config.max_artifact_bytes)
                        );
                    }
                    info!("wrote chunk {filename} ({:.2} MB)", mb(size));
                    entries.push(ChunkEntry {
                        file: filename.clone(),
                        size_mb: mb(size),
                    });
                    survivors.push((filename, chunk));
                }
                Err(e) => {
                    warn!("dropping chunk {filename}: {e}");
                    let _ = fs::remove_file(&path);
                }
            }
        }
        if survivors.len() == total_chunks {
            break entries;
        }
        pending = survivors;
    };

    Ok(Manifest::Chunked {
        total_chunks: entries.len(),
        chunks: entries,
        format: config.format(),
        total_size_mb: mb(total_size),
        chunk_size_mb: mb(config.target_chunk_bytes),
        generated_at: dataset.generated_at.clone(),
    })
}

/// Degenerate path: chunking was required but there are no features to
/// slice, so partition by track type instead. The only mode allowed to
/// exceed the byte budget.
fn write_fallback_chunks(
    dataset: &Dataset,
    cache_dir: &Path,
    config: &PartitionConfig,
    total_size: u64,
) -> Result<Manifest, CacheError> {
    let total_chunks = dataset.tracks.len();
    let mut entries = Vec::new();

    for (chunk_id, (&track_type, data)) in dataset.tracks.iter().enumerate() {
        let mut tracks = BTreeMap::new();
        tracks.insert(track_type, data.clone());
        let chunk = Dataset {
            metrics: dataset.metrics.clone(),
            bounds: dataset.bounds,
            generated_at: dataset.generated_at.clone(),
            version: dataset.version.clone(),
            tracks,
            chunk_info: Some(ChunkInfo {
                chunk_id,
                total_chunks,
                track_types: vec![track_type],
            }),
        };

        let filename = config.artifact_name(&format!(
            "{BASE_FILENAME}_chunk_{chunk_id}_{}",
            track_type.dir_name()
        ));
        let encoded = encode(&chunk, config.compress)?;
        match write_bytes(&cache_dir.join(&filename), &encoded) {
            Ok(()) => entries.push(ChunkEntry {
                file: filename,
                size_mb: mb(encoded.len() as u64),
            }),
            Err(e) => warn!("dropping fallback chunk {chunk_id}: {e}"),
        }
    }

    Ok(Manifest::Chunked {
        total_chunks: entries.len(),
        chunks: entries,
        format: config.format(),
        total_size_mb: mb(total_size),
        chunk_size_mb: mb(config.target_chunk_bytes),
        generated_at: dataset.generated_at.clone(),
    })
}
