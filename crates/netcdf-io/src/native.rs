//! Native netCDF access using the netcdf library.
//!
//! Wraps libnetcdf (and HDF5 underneath) behind the [`DatasetReader`] and
//! [`DatasetWriter`] traits. Variables of character, string or user-defined
//! type are not exposed; numeric variables are read whole and sliced in memory.

use std::path::{Path, PathBuf};
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::debug;

use crate::dataset::{DatasetOpener, DatasetReader, DatasetWriter};
use crate::error::{NetCdfError, NetCdfResult};
use crate::types::{AttrValue, Attribute, Dimension, NcType, VariableDef, VariableInfo, Values};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// Call early in `main()`, before any netCDF file is opened. Safe to call
/// more than once.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

// =============================================================================
// Reader
// =============================================================================

/// Read-only handle on a netCDF file.
pub struct NetCdfReader {
    path: PathBuf,
    file: netcdf::File,
}

impl NetCdfReader {
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path).map_err(|e| {
            NetCdfError::Library(format!("failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self { path, file })
    }

    fn info(&self, var: &netcdf::Variable) -> Option<VariableInfo> {
        let name = var.name();
        let Some(dtype) = nc_type(&var.vartype()) else {
            debug!(variable = %name, "Skipping variable of unsupported type");
            return None;
        };
        let dimensions = var
            .dimensions()
            .iter()
            .map(|d| Dimension::new(d.name(), d.len()))
            .collect();
        let attributes = var
            .attributes()
            .filter_map(|attr| {
                let value = attr.value().ok().and_then(attr_value)?;
                Some(Attribute::new(attr.name(), value))
            })
            .collect();
        Some(VariableInfo {
            name,
            dtype,
            dimensions,
            attributes,
        })
    }
}

impl DatasetReader for NetCdfReader {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file.dimension(name).map(|d| d.len())
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.file
            .dimensions()
            .map(|d| Dimension::new(d.name(), d.len()))
            .collect()
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        let attr = self.file.attribute(name)?;
        attr.value().ok().and_then(attr_value)
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.file
            .variables()
            .filter_map(|var| self.info(&var))
            .collect()
    }

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        let var = self.file.variable(name)?;
        self.info(&var)
    }

    fn read_values(&self, name: &str) -> NetCdfResult<Values> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))?;
        let dtype = nc_type(&var.vartype())
            .ok_or_else(|| NetCdfError::invalid(format!("{} has a non-numeric type", name)))?;

        let values = match dtype {
            NcType::Byte => Values::Byte(var.get_values::<i8, _>(..)?),
            NcType::UByte => Values::UByte(var.get_values::<u8, _>(..)?),
            NcType::Short => Values::Short(var.get_values::<i16, _>(..)?),
            NcType::UShort => Values::UShort(var.get_values::<u16, _>(..)?),
            NcType::Int => Values::Int(var.get_values::<i32, _>(..)?),
            NcType::UInt => Values::UInt(var.get_values::<u32, _>(..)?),
            NcType::Int64 => Values::Int64(var.get_values::<i64, _>(..)?),
            NcType::UInt64 => Values::UInt64(var.get_values::<u64, _>(..)?),
            NcType::Float => Values::Float(var.get_values::<f32, _>(..)?),
            NcType::Double => Values::Double(var.get_values::<f64, _>(..)?),
        };
        Ok(values)
    }
}

/// Opens every path as a native netCDF file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfOpener;

impl DatasetOpener for NetCdfOpener {
    fn open(&self, path: &Path) -> NetCdfResult<Box<dyn DatasetReader>> {
        Ok(Box::new(NetCdfReader::open(path)?))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Writable handle on a newly created netCDF-4 file.
pub struct NetCdfWriter {
    path: PathBuf,
    file: netcdf::FileMut,
}

impl NetCdfWriter {
    /// Create the file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref().to_path_buf();
        let file = netcdf::create(&path).map_err(|e| {
            NetCdfError::Library(format!("failed to create {}: {}", path.display(), e))
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetWriter for NetCdfWriter {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file.dimension(name).map(|d| d.len())
    }

    fn define_dimension(&mut self, name: &str, len: usize) -> NetCdfResult<()> {
        if self.file.dimension(name).is_some() {
            return Err(NetCdfError::Conflict(format!("dimension {} already defined", name)));
        }
        self.file.add_dimension(name, len)?;
        Ok(())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn define_variable(&mut self, def: &VariableDef) -> NetCdfResult<()> {
        if self.has_variable(&def.name) {
            return Err(NetCdfError::Conflict(format!("variable {} already defined", def.name)));
        }
        let dims: Vec<&str> = def.dimensions.iter().map(String::as_str).collect();
        let mut var = match def.dtype {
            NcType::Byte => self.file.add_variable::<i8>(&def.name, &dims)?,
            NcType::UByte => self.file.add_variable::<u8>(&def.name, &dims)?,
            NcType::Short => self.file.add_variable::<i16>(&def.name, &dims)?,
            NcType::UShort => self.file.add_variable::<u16>(&def.name, &dims)?,
            NcType::Int => self.file.add_variable::<i32>(&def.name, &dims)?,
            NcType::UInt => self.file.add_variable::<u32>(&def.name, &dims)?,
            NcType::Int64 => self.file.add_variable::<i64>(&def.name, &dims)?,
            NcType::UInt64 => self.file.add_variable::<u64>(&def.name, &dims)?,
            NcType::Float => self.file.add_variable::<f32>(&def.name, &dims)?,
            NcType::Double => self.file.add_variable::<f64>(&def.name, &dims)?,
        };
        for attr in &def.attributes {
            var.put_attribute(&attr.name, netcdf_attr(&attr.value))?;
        }
        Ok(())
    }

    fn put_global_attribute(&mut self, name: &str, value: AttrValue) -> NetCdfResult<()> {
        self.file.add_attribute(name, netcdf_attr(&value))?;
        Ok(())
    }

    fn write_values(&mut self, name: &str, values: &Values) -> NetCdfResult<()> {
        let mut var = self
            .file
            .variable_mut(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))?;
        let dtype = nc_type(&var.vartype())
            .ok_or_else(|| NetCdfError::invalid(format!("{} has a non-numeric type", name)))?;

        match values.cast(dtype)? {
            Values::Byte(v) => var.put_values(&v, ..)?,
            Values::UByte(v) => var.put_values(&v, ..)?,
            Values::Short(v) => var.put_values(&v, ..)?,
            Values::UShort(v) => var.put_values(&v, ..)?,
            Values::Int(v) => var.put_values(&v, ..)?,
            Values::UInt(v) => var.put_values(&v, ..)?,
            Values::Int64(v) => var.put_values(&v, ..)?,
            Values::UInt64(v) => var.put_values(&v, ..)?,
            Values::Float(v) => var.put_values(&v, ..)?,
            Values::Double(v) => var.put_values(&v, ..)?,
        }
        Ok(())
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn nc_type(vartype: &NcVariableType) -> Option<NcType> {
    match vartype {
        NcVariableType::Int(IntType::I8) => Some(NcType::Byte),
        NcVariableType::Int(IntType::U8) => Some(NcType::UByte),
        NcVariableType::Int(IntType::I16) => Some(NcType::Short),
        NcVariableType::Int(IntType::U16) => Some(NcType::UShort),
        NcVariableType::Int(IntType::I32) => Some(NcType::Int),
        NcVariableType::Int(IntType::U32) => Some(NcType::UInt),
        NcVariableType::Int(IntType::I64) => Some(NcType::Int64),
        NcVariableType::Int(IntType::U64) => Some(NcType::UInt64),
        NcVariableType::Float(FloatType::F32) => Some(NcType::Float),
        NcVariableType::Float(FloatType::F64) => Some(NcType::Double),
        _ => None,
    }
}

#[allow(unreachable_patterns)]
fn attr_value(value: AttributeValue) -> Option<AttrValue> {
    let numeric = match value {
        AttributeValue::Str(s) => return Some(AttrValue::Text(s)),
        AttributeValue::Strs(s) => return Some(AttrValue::Text(s.join("\n"))),
        AttributeValue::Schar(x) => Values::Byte(vec![x]),
        AttributeValue::Schars(x) => Values::Byte(x),
        AttributeValue::Uchar(x) => Values::UByte(vec![x]),
        AttributeValue::Uchars(x) => Values::UByte(x),
        AttributeValue::Short(x) => Values::Short(vec![x]),
        AttributeValue::Shorts(x) => Values::Short(x),
        AttributeValue::Ushort(x) => Values::UShort(vec![x]),
        AttributeValue::Ushorts(x) => Values::UShort(x),
        AttributeValue::Int(x) => Values::Int(vec![x]),
        AttributeValue::Ints(x) => Values::Int(x),
        AttributeValue::Uint(x) => Values::UInt(vec![x]),
        AttributeValue::Uints(x) => Values::UInt(x),
        AttributeValue::Longlong(x) => Values::Int64(vec![x]),
        AttributeValue::Longlongs(x) => Values::Int64(x),
        AttributeValue::Ulonglong(x) => Values::UInt64(vec![x]),
        AttributeValue::Ulonglongs(x) => Values::UInt64(x),
        AttributeValue::Float(x) => Values::Float(vec![x]),
        AttributeValue::Floats(x) => Values::Float(x),
        AttributeValue::Double(x) => Values::Double(vec![x]),
        AttributeValue::Doubles(x) => Values::Double(x),
        _ => return None,
    };
    Some(AttrValue::Numeric(numeric))
}

fn netcdf_attr(value: &AttrValue) -> AttributeValue {
    let numeric = match value {
        AttrValue::Text(s) => return AttributeValue::Str(s.clone()),
        AttrValue::Numeric(v) => v,
    };
    // Single values are written as scalars so tools print `x = 1.0` rather than a list
    match (numeric, numeric.len() == 1) {
        (Values::Byte(v), true) => AttributeValue::Schar(v[0]),
        (Values::Byte(v), false) => AttributeValue::Schars(v.clone()),
        (Values::UByte(v), true) => AttributeValue::Uchar(v[0]),
        (Values::UByte(v), false) => AttributeValue::Uchars(v.clone()),
        (Values::Short(v), true) => AttributeValue::Short(v[0]),
        (Values::Short(v), false) => AttributeValue::Shorts(v.clone()),
        (Values::UShort(v), true) => AttributeValue::Ushort(v[0]),
        (Values::UShort(v), false) => AttributeValue::Ushorts(v.clone()),
        (Values::Int(v), true) => AttributeValue::Int(v[0]),
        (Values::Int(v), false) => AttributeValue::Ints(v.clone()),
        (Values::UInt(v), true) => AttributeValue::Uint(v[0]),
        (Values::UInt(v), false) => AttributeValue::Uints(v.clone()),
        (Values::Int64(v), true) => AttributeValue::Longlong(v[0]),
        (Values::Int64(v), false) => AttributeValue::Longlongs(v.clone()),
        (Values::UInt64(v), true) => AttributeValue::Ulonglong(v[0]),
        (Values::UInt64(v), false) => AttributeValue::Ulonglongs(v.clone()),
        (Values::Float(v), true) => AttributeValue::Float(v[0]),
        (Values::Float(v), false) => AttributeValue::Floats(v.clone()),
        (Values::Double(v), true) => AttributeValue::Double(v[0]),
        (Values::Double(v), false) => AttributeValue::Doubles(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_conversion_keeps_scalars_scalar() {
        assert!(matches!(
            netcdf_attr(&AttrValue::from(2.5_f64)),
            AttributeValue::Double(x) if x == 2.5
        ));
        assert!(matches!(
            netcdf_attr(&AttrValue::Numeric(Values::Int(vec![1, 2]))),
            AttributeValue::Ints(_)
        ));
        assert_eq!(
            attr_value(AttributeValue::Str("SCRIP".to_string())),
            Some(AttrValue::Text("SCRIP".to_string()))
        );
        assert_eq!(
            attr_value(AttributeValue::Float(-999.0)).and_then(|v| v.as_f64()),
            Some(-999.0)
        );
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.nc");

        {
            let mut writer = NetCdfWriter::create(&path).unwrap();
            writer.define_dimension("ncol", 3).unwrap();
            assert!(writer.define_dimension("ncol", 3).is_err());
            let def = VariableDef::new("T", NcType::Double, &["ncol"])
                .with_attribute("units", "K")
                .with_attribute("_FillValue", 1.0e36_f64);
            writer.define_variable(&def).unwrap();
            writer
                .put_global_attribute("Conventions", AttrValue::from("CF-1.6"))
                .unwrap();
            writer
                .write_values("T", &Values::Float(vec![1.0, 2.0, 3.0]))
                .unwrap();
        }

        let reader = NetCdfReader::open(&path).unwrap();
        assert_eq!(reader.dimension_len("ncol"), Some(3));
        assert_eq!(reader.global_text("Conventions").as_deref(), Some("CF-1.6"));
        let info = reader.require_variable("T").unwrap();
        assert_eq!(info.dtype, NcType::Double);
        assert_eq!(info.missing_value(), Some(1.0e36));
        assert_eq!(reader.read_f64("T").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(NetCdfOpener.open(Path::new("/nonexistent/input.nc")).is_err());
    }
}
