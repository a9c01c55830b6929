//! Dataset I/O for the regridder.
//!
//! The regridding engine never talks to libnetcdf directly. It reads and
//! writes through three traits:
//!
//! - [`DatasetReader`]: inquiry and whole-variable reads of an open dataset
//! - [`DatasetWriter`]: dimension/variable definition and data writes
//! - [`DatasetOpener`]: opens a fresh reader per path (one per worker thread)
//!
//! Two backends implement them: [`native`] on top of the `netcdf` crate, and
//! [`memory`] for datasets assembled in code (fixtures and tests).
//!
//! # Example
//!
//! ```
//! use netcdf_io::{DatasetReader, MemoryDataset, Values};
//!
//! let ds = MemoryDataset::new("in.nc")
//!     .with_dimension("ncol", 2)
//!     .with_variable("T", &["ncol"], Values::Double(vec![280.0, 290.0]));
//! assert_eq!(ds.read_f64("T").unwrap(), vec![280.0, 290.0]);
//! ```

pub mod dataset;
pub mod error;
pub mod memory;
pub mod native;
pub mod slab;
pub mod types;

pub use dataset::{DatasetOpener, DatasetReader, DatasetWriter};
pub use error::{NetCdfError, NetCdfResult};
pub use memory::{MemoryCatalog, MemoryDataset};
pub use native::{silence_hdf5_errors, NetCdfOpener, NetCdfReader, NetCdfWriter};
pub use slab::Hyperslab;
pub use types::{
    AttrValue, Attribute, Dimension, NcType, VariableDef, VariableInfo, Values,
    MISSING_VALUE_ATTRS,
};
