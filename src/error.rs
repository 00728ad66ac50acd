use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the brepkit model library.
#[derive(Debug, Error)]
pub enum BrepError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors related to components, relationships and unique vertices.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("component not found: {0}")]
    NotFound(String),

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors related to mesh connectivity edits.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("{what} index {index} is out of range (count {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("invalid element: {0}")]
    InvalidElement(String),
}

/// Errors related to persistence and format dispatch.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("stream i/o error: {0}")]
    Stream(#[source] std::io::Error),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MeshError {
    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }
}

impl FormatError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for results using [`BrepError`].
pub type Result<T> = std::result::Result<T, BrepError>;
