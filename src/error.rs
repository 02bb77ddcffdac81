//! Crate-level error types.
//!
//! Pre-flight failures (bad options, unsupported backend/mode pairs) get
//! their own variants so callers can distinguish them from runtime trouble.
//! Runtime trouble mostly never surfaces here: the harvesters absorb it and
//! deliver a smaller result instead.

use crate::request::{Backend, FetchMode};
use crate::session::SessionError;

/// Errors returned by the harvest entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request option failed validation before any I/O.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The named backend is not in the supported set.
    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// The backend exists but does not support the requested mode.
    #[error("{backend} does not support {mode} mode")]
    UnsupportedMode { backend: Backend, mode: FetchMode },

    /// The rendering session could not be opened or driven.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}
