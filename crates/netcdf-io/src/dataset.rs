//! Trait seam between the regridding engine and concrete dataset storage.
//!
//! Readers expose inquiry in two flavours: an existence check returning
//! `Option` (`variable`, `dimension_len`) and a fatal-on-absence variant
//! returning `Err(MissingData)` (`require_variable`, `require_dimension`).

use std::path::Path;

use crate::error::{NetCdfError, NetCdfResult};
use crate::slab::Hyperslab;
use crate::types::{AttrValue, Dimension, VariableDef, VariableInfo, Values};

/// Read access to one open dataset.
pub trait DatasetReader: Send {
    /// Location the dataset was opened from, used for provenance attributes.
    fn location(&self) -> String;

    /// Length of a dimension, if it exists.
    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// All dimensions in definition order.
    fn dimensions(&self) -> Vec<Dimension>;

    /// A global attribute, if present.
    fn global_attribute(&self, name: &str) -> Option<AttrValue>;

    /// All variables in definition order.
    fn variables(&self) -> Vec<VariableInfo>;

    /// Metadata of a single variable, if present.
    fn variable(&self, name: &str) -> Option<VariableInfo>;

    /// Read every value of a variable in its stored type.
    fn read_values(&self, name: &str) -> NetCdfResult<Values>;

    /// Read every value of a variable converted to double precision.
    fn read_f64(&self, name: &str) -> NetCdfResult<Vec<f64>> {
        Ok(self.read_values(name)?.to_f64())
    }

    /// Read a start/count/stride selection converted to double precision.
    fn read_slab_f64(&self, name: &str, slab: &Hyperslab) -> NetCdfResult<Vec<f64>> {
        let info = self.require_variable(name)?;
        let data = self.read_f64(name)?;
        slab.extract(&data, &info.shape())
    }

    /// Like [`DatasetReader::dimension_len`] but absence is an error.
    fn require_dimension(&self, name: &str) -> NetCdfResult<usize> {
        self.dimension_len(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} dimension", name)))
    }

    /// Like [`DatasetReader::variable`] but absence is an error.
    fn require_variable(&self, name: &str) -> NetCdfResult<VariableInfo> {
        self.variable(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))
    }

    /// Text value of a global attribute.
    fn global_text(&self, name: &str) -> Option<String> {
        self.global_attribute(name)
            .and_then(|v| v.as_text().map(str::to_string))
    }

    /// Missing-value lookup: a flag plus the sentinel in double precision.
    fn missing_value(&self, name: &str) -> NetCdfResult<(bool, f64)> {
        let info = self.require_variable(name)?;
        Ok(match info.missing_value() {
            Some(value) => (true, value),
            None => (false, f64::NAN),
        })
    }
}

/// Define-and-write access to an output dataset.
pub trait DatasetWriter: Send {
    /// Length of an already defined dimension.
    fn dimension_len(&self, name: &str) -> Option<usize>;

    /// Define a new dimension. Redefinition is an error.
    fn define_dimension(&mut self, name: &str, len: usize) -> NetCdfResult<()>;

    fn has_variable(&self, name: &str) -> bool;

    /// Define a variable with its attributes. Every dimension must already exist.
    fn define_variable(&mut self, def: &VariableDef) -> NetCdfResult<()>;

    /// Create or overwrite a global attribute.
    fn put_global_attribute(&mut self, name: &str, value: AttrValue) -> NetCdfResult<()>;

    /// Write the full contents of a variable, converting to its stored type.
    fn write_values(&mut self, name: &str, values: &Values) -> NetCdfResult<()>;

    /// Flush pending data to storage.
    fn sync(&mut self) -> NetCdfResult<()> {
        Ok(())
    }

    /// Define a dimension unless one with that name exists already.
    ///
    /// Returns the length of the dimension that ends up defined.
    fn ensure_dimension(&mut self, name: &str, len: usize) -> NetCdfResult<usize> {
        match self.dimension_len(name) {
            Some(existing) => Ok(existing),
            None => {
                self.define_dimension(name, len)?;
                Ok(len)
            }
        }
    }
}

/// Opens datasets by path. Shared by worker threads, each of which opens its own reader.
pub trait DatasetOpener: Sync {
    fn open(&self, path: &Path) -> NetCdfResult<Box<dyn DatasetReader>>;
}
