//! GPX input discovery and parsing.
//!
//! Files under one track-type directory are parsed in parallel; a file
//! that fails to parse is logged and contributes zero points, the run
//! continues.

use geo::Point;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One parsed input file: its base name and the per-segment point lists
/// (x = longitude, y = latitude).
#[derive(Debug, Clone)]
pub struct TrackFile {
    pub name: String,
    pub segments: Vec<Vec<Point<f64>>>,
}

impl TrackFile {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// Recursively finds `.gpx` files under `dir`, sorted for deterministic
/// processing order. A missing directory is treated as empty.
pub fn find_gpx_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "gpx")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Parses every GPX file under `dir` in parallel.
pub fn parse_directory(dir: &Path) -> Vec<TrackFile> {
    let files = find_gpx_files(dir);
    if files.is_empty() {
        debug!("no .gpx files under {}", dir.display());
        return Vec::new();
    }

    info!("parsing {} .gpx files under {}", files.len(), dir.display());

    let parsed: Vec<TrackFile> = files
        .into_par_iter()
        .progress()
        .filter_map(|path| match parse_file(&path) {
            Ok(file) => {
                debug!("{}: {} points", file.name, file.point_count());
                Some(file)
            }
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    let total: usize = parsed.iter().map(TrackFile::point_count).sum();
    info!("extracted {} points from {} files", total, parsed.len());
    parsed
}

fn parse_file(path: &Path) -> Result<TrackFile, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let gpx = gpx::read(reader)?;

    let segments: Vec<Vec<Point<f64>>> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .map(|segment| segment.points.iter().map(|wpt| wpt.point()).collect())
        .collect();

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(TrackFile { name, segments })
}
