//! Fatal error conditions for the pipeline.
//!
//! Per-file parse failures are not represented here: they degrade to zero
//! contributed points and the run continues. A chunk-write failure is
//! tolerated by the partitioner and only logged; everything below ends
//! the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A required track type produced no input. Road is required because
    /// the explored-area metrics are computed from it.
    #[error("no GPX input for required track type '{track_type}' under {}", dir.display())]
    EmptyInput {
        track_type: &'static str,
        dir: PathBuf,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize dataset")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to encode artifact")]
    Encode(#[from] std::io::Error),
}
