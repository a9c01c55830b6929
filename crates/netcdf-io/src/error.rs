//! Error types for dataset I/O operations.

use thiserror::Error;

/// Result type for dataset I/O operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for dataset I/O.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required dimension, variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format or shape
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Error reported by the netCDF C library
    #[error("netCDF library error: {0}")]
    Library(String),

    /// Attempt to define something that already exists with a different shape
    #[error("Conflicting definition: {0}")]
    Conflict(String),
}

impl NetCdfError {
    /// Create a MissingData error.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }

    /// Create an InvalidFormat error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }
}

impl From<netcdf::Error> for NetCdfError {
    fn from(err: netcdf::Error) -> Self {
        Self::Library(err.to_string())
    }
}
