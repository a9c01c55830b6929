//! In-memory datasets.
//!
//! `MemoryDataset` implements both [`DatasetReader`] and [`DatasetWriter`], so
//! a whole regridding run can be driven without touching the filesystem.
//! `MemoryCatalog` maps paths to datasets and hands every caller its own copy,
//! mirroring how each worker opens a private read handle on a real file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::{DatasetOpener, DatasetReader, DatasetWriter};
use crate::error::{NetCdfError, NetCdfResult};
use crate::types::{AttrValue, Attribute, Dimension, VariableDef, VariableInfo, Values};

#[derive(Debug, Clone)]
struct MemoryVariable {
    def: VariableDef,
    values: Option<Values>,
}

/// A dataset held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    location: String,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<MemoryVariable>,
}

impl MemoryDataset {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Add a dimension, replacing the length of an existing one.
    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        match self.dimensions.iter_mut().find(|d| d.name == name) {
            Some(dim) => dim.len = len,
            None => self.dimensions.push(Dimension::new(name, len)),
        }
        self
    }

    /// Add or replace a global attribute.
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        set_attribute(&mut self.attributes, Attribute::new(name, value));
        self
    }

    /// Add a variable with its data. The storage type follows the data.
    pub fn with_variable(mut self, name: &str, dimensions: &[&str], values: Values) -> Self {
        let def = VariableDef::new(name, values.nc_type(), dimensions);
        self.variables.retain(|v| v.def.name != name);
        self.variables.push(MemoryVariable {
            def,
            values: Some(values),
        });
        self
    }

    /// Add or replace an attribute on an existing variable. Unknown variables are ignored.
    pub fn with_variable_attribute(
        mut self,
        variable: &str,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Self {
        if let Some(var) = self.variables.iter_mut().find(|v| v.def.name == variable) {
            var.def.set_attribute(name, value);
        }
        self
    }

    /// Global attributes in definition order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Stored values of a variable, if it has been written.
    pub fn values(&self, name: &str) -> Option<&Values> {
        self.find(name).and_then(|v| v.values.as_ref())
    }

    /// Definition of a variable as it was created.
    pub fn definition(&self, name: &str) -> Option<&VariableDef> {
        self.find(name).map(|v| &v.def)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.def.name.clone()).collect()
    }

    fn find(&self, name: &str) -> Option<&MemoryVariable> {
        self.variables.iter().find(|v| v.def.name == name)
    }

    fn info(&self, var: &MemoryVariable) -> VariableInfo {
        VariableInfo {
            name: var.def.name.clone(),
            dtype: var.def.dtype,
            dimensions: var
                .def
                .dimensions
                .iter()
                .map(|d| Dimension::new(d.as_str(), self.dim_len(d).unwrap_or(0)))
                .collect(),
            attributes: var.def.attributes.clone(),
        }
    }

    fn dim_len(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().find(|d| d.name == name).map(|d| d.len)
    }
}

fn set_attribute(attributes: &mut Vec<Attribute>, attr: Attribute) {
    match attributes.iter_mut().find(|a| a.name == attr.name) {
        Some(existing) => existing.value = attr.value,
        None => attributes.push(attr),
    }
}

impl DatasetReader for MemoryDataset {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dim_len(name)
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.clone()
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.clone())
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.variables.iter().map(|v| self.info(v)).collect()
    }

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        self.find(name).map(|v| self.info(v))
    }

    fn read_values(&self, name: &str) -> NetCdfResult<Values> {
        let var = self
            .find(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))?;
        var.values
            .clone()
            .ok_or_else(|| NetCdfError::missing(format!("data for {}", name)))
    }
}

impl DatasetWriter for MemoryDataset {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dim_len(name)
    }

    fn define_dimension(&mut self, name: &str, len: usize) -> NetCdfResult<()> {
        if self.dim_len(name).is_some() {
            return Err(NetCdfError::Conflict(format!("dimension {} already defined", name)));
        }
        self.dimensions.push(Dimension::new(name, len));
        Ok(())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn define_variable(&mut self, def: &VariableDef) -> NetCdfResult<()> {
        if self.has_variable(&def.name) {
            return Err(NetCdfError::Conflict(format!("variable {} already defined", def.name)));
        }
        if let Some(missing) = def.dimensions.iter().find(|d| self.dim_len(d).is_none()) {
            return Err(NetCdfError::missing(format!(
                "{} dimension for variable {}",
                missing, def.name
            )));
        }
        self.variables.push(MemoryVariable {
            def: def.clone(),
            values: None,
        });
        Ok(())
    }

    fn put_global_attribute(&mut self, name: &str, value: AttrValue) -> NetCdfResult<()> {
        set_attribute(&mut self.attributes, Attribute::new(name, value));
        Ok(())
    }

    fn write_values(&mut self, name: &str, values: &Values) -> NetCdfResult<()> {
        let (dtype, expected) = {
            let var = self
                .find(name)
                .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))?;
            let expected: usize = var
                .def
                .dimensions
                .iter()
                .map(|d| self.dim_len(d).unwrap_or(0))
                .product();
            (var.def.dtype, expected)
        };
        if values.len() != expected {
            return Err(NetCdfError::invalid(format!(
                "{} expects {} values, got {}",
                name,
                expected,
                values.len()
            )));
        }
        let stored = values.cast(dtype)?;
        if let Some(var) = self.variables.iter_mut().find(|v| v.def.name == name) {
            var.values = Some(stored);
        }
        Ok(())
    }
}

/// Path-addressed collection of in-memory datasets.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    datasets: HashMap<PathBuf, MemoryDataset>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, dataset: MemoryDataset) {
        self.datasets.insert(path.into(), dataset);
    }

    pub fn with(mut self, path: impl Into<PathBuf>, dataset: MemoryDataset) -> Self {
        self.insert(path, dataset);
        self
    }
}

impl DatasetOpener for MemoryCatalog {
    fn open(&self, path: &Path) -> NetCdfResult<Box<dyn DatasetReader>> {
        self.datasets
            .get(path)
            .cloned()
            .map(|ds| Box::new(ds) as Box<dyn DatasetReader>)
            .ok_or_else(|| NetCdfError::missing(format!("dataset {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::Hyperslab;
    use crate::types::NcType;

    fn sample() -> MemoryDataset {
        MemoryDataset::new("sample.nc")
            .with_dimension("lat", 2)
            .with_dimension("lon", 3)
            .with_attribute("Conventions", "CF-1.6")
            .with_variable(
                "T",
                &["lat", "lon"],
                Values::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            )
            .with_variable_attribute("T", "_FillValue", 1.0e20_f32)
    }

    #[test]
    fn test_reader_inquiry() {
        let ds = sample();
        assert_eq!(DatasetReader::dimension_len(&ds, "lon"), Some(3));
        assert!(ds.require_dimension("time").is_err());
        assert_eq!(ds.global_text("Conventions").as_deref(), Some("CF-1.6"));

        let info = ds.require_variable("T").unwrap();
        assert_eq!(info.dtype, NcType::Float);
        assert_eq!(info.shape(), vec![2, 3]);
        let (has_mss, mss) = ds.missing_value("T").unwrap();
        assert!(has_mss);
        assert!((mss - 1.0e20).abs() < 1.0e13);
    }

    #[test]
    fn test_read_slab() {
        let ds = sample();
        let col = ds
            .read_slab_f64("T", &Hyperslab::strided(&[0, 1], &[2, 1], &[1, 1]))
            .unwrap();
        assert_eq!(col, vec![2.0, 5.0]);
    }

    #[test]
    fn test_writer_rejects_duplicates_and_bad_lengths() {
        let mut ds = MemoryDataset::new("out.nc");
        ds.define_dimension("ncol", 2).unwrap();
        assert!(ds.define_dimension("ncol", 2).is_err());
        assert_eq!(ds.ensure_dimension("ncol", 5).unwrap(), 2);

        let def = VariableDef::new("x", NcType::Int, &["ncol"]);
        ds.define_variable(&def).unwrap();
        assert!(ds.define_variable(&def).is_err());
        assert!(ds.write_values("x", &Values::Double(vec![1.0])).is_err());

        ds.write_values("x", &Values::Double(vec![1.0, 2.0])).unwrap();
        assert_eq!(ds.values("x"), Some(&Values::Int(vec![1, 2])));
    }

    #[test]
    fn test_define_variable_requires_dimensions() {
        let mut ds = MemoryDataset::new("out.nc");
        let def = VariableDef::new("x", NcType::Double, &["missing"]);
        assert!(ds.define_variable(&def).is_err());
    }

    #[test]
    fn test_catalog_hands_out_copies() {
        let catalog = MemoryCatalog::new().with("in.nc", sample());
        let a = catalog.open(Path::new("in.nc")).unwrap();
        let b = catalog.open(Path::new("in.nc")).unwrap();
        assert_eq!(a.read_f64("T").unwrap(), b.read_f64("T").unwrap());
        assert!(catalog.open(Path::new("other.nc")).is_err());
    }
}
