//! Errors raised while loading the dataset.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("GeoJSON file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read GeoJSON file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GeoJSON payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid GeoJSON format: {0}")]
    InvalidFormat(String),
}
