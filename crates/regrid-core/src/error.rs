//! Error types for regridding.

use netcdf_io::NetCdfError;
use thiserror::Error;

/// Errors that can occur while regridding.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Invalid or unsupported configuration, including map-file conventions.
    #[error("configuration error: {0}")]
    Config(String),

    /// A numerical invariant of the destination grid does not hold.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Error from the dataset I/O layer.
    #[error("dataset error: {0}")]
    Dataset(#[from] NetCdfError),

    /// An external back-end reported failure.
    #[error("{backend} failed with code {code}: {message}")]
    Backend {
        backend: String,
        code: i32,
        message: String,
    },

    /// A library back-end was selected but is not built in.
    #[error("{0} back-end is not available; rebuild with it enabled")]
    BackendUnavailable(String),
}

impl RegridError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Numerical error.
    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    /// Create a Backend error.
    pub fn backend(backend: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            code,
            message: message.into(),
        }
    }
}

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;
