use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal data-loading errors. Row-level and file-level problems are not
/// errors: they are logged and recorded in the [`LoadReport`](super::LoadReport).
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data path does not exist or is not a directory: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("failed to read data directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid price bars found in {}", path.display())]
    NoUsableData { path: PathBuf },

    #[error("bar store is empty")]
    EmptyStore,
}

/// Why a single file was skipped during a load.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum FileIssue {
    #[error("could not derive a symbol from the file name")]
    NoSymbol,

    #[error("could not open file: {0}")]
    Open(String),

    #[error("unrecognized header: {0}")]
    UnknownLayout(String),
}
