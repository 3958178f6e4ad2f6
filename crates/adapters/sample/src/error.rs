//! Sample adapter error types.

use std::path::PathBuf;

use minicam_domain::error::MiniCamError;

/// Errors specific to the sample adapter.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// A media file could not be read.
    #[error("failed to read media file {path}")]
    MediaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller asked for a stream variant the sample does not serve.
    #[error("unknown stream {0:?}")]
    UnknownStream(String),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] MiniCamError),
}

impl SampleError {
    /// Convert into a [`MiniCamError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> MiniCamError {
        match self {
            Self::Domain(err) => err,
            other => MiniCamError::transport(other),
        }
    }
}

impl From<SampleError> for MiniCamError {
    fn from(err: SampleError) -> Self {
        err.into_domain()
    }
}
