use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoseBatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid video map {path}: {source}")]
    VideoMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Manifest serialization error: {0}")]
    ManifestSerialization(#[from] serde_yaml::Error),
}

impl PoseBatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PoseBatchError>;
