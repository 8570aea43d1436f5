use std::path::PathBuf;

use thiserror::Error;

/// Errors that can stop the server from starting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid PORT value: {0:?}")]
    InvalidPort(String),

    #[error("Failed to access config at {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::ConfigIo {
            path: path.into(),
            source,
        }
    }
}
