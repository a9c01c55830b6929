//! Value, attribute and metadata types shared by every dataset backend.

use num_traits::{NumCast, ToPrimitive};

use crate::error::{NetCdfError, NetCdfResult};

/// Numeric storage type of a variable or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NcType {
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
}

impl NcType {
    /// CDL name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::UByte => "ubyte",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl std::fmt::Display for NcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A flat, row-major buffer of typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Byte(Vec<i8>),
    UByte(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

/// Apply the same expression to whichever vector a `Values` holds.
macro_rules! with_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            Values::Byte($v) => $body,
            Values::UByte($v) => $body,
            Values::Short($v) => $body,
            Values::UShort($v) => $body,
            Values::Int($v) => $body,
            Values::UInt($v) => $body,
            Values::Int64($v) => $body,
            Values::UInt64($v) => $body,
            Values::Float($v) => $body,
            Values::Double($v) => $body,
        }
    };
}

impl Values {
    /// Storage type of the buffer.
    pub fn nc_type(&self) -> NcType {
        match self {
            Self::Byte(_) => NcType::Byte,
            Self::UByte(_) => NcType::UByte,
            Self::Short(_) => NcType::Short,
            Self::UShort(_) => NcType::UShort,
            Self::Int(_) => NcType::Int,
            Self::UInt(_) => NcType::UInt,
            Self::Int64(_) => NcType::Int64,
            Self::UInt64(_) => NcType::UInt64,
            Self::Float(_) => NcType::Float,
            Self::Double(_) => NcType::Double,
        }
    }

    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen every element to double precision.
    pub fn to_f64(&self) -> Vec<f64> {
        with_values!(self, v => v.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).collect())
    }

    /// First element as a double, if any.
    pub fn first_f64(&self) -> Option<f64> {
        with_values!(self, v => v.first().and_then(|x| x.to_f64()))
    }

    /// Build a buffer of the requested type from doubles.
    ///
    /// Fails when a value does not fit the target type.
    pub fn from_f64(dtype: NcType, data: &[f64]) -> NetCdfResult<Self> {
        Ok(match dtype {
            NcType::Byte => Self::Byte(cast_all(data, dtype)?),
            NcType::UByte => Self::UByte(cast_all(data, dtype)?),
            NcType::Short => Self::Short(cast_all(data, dtype)?),
            NcType::UShort => Self::UShort(cast_all(data, dtype)?),
            NcType::Int => Self::Int(cast_all(data, dtype)?),
            NcType::UInt => Self::UInt(cast_all(data, dtype)?),
            NcType::Int64 => Self::Int64(cast_all(data, dtype)?),
            NcType::UInt64 => Self::UInt64(cast_all(data, dtype)?),
            NcType::Float => Self::Float(cast_all(data, dtype)?),
            NcType::Double => Self::Double(data.to_vec()),
        })
    }

    /// Convert to another storage type.
    pub fn cast(&self, dtype: NcType) -> NetCdfResult<Self> {
        if self.nc_type() == dtype {
            return Ok(self.clone());
        }
        Self::from_f64(dtype, &self.to_f64())
    }
}

fn cast_all<T: NumCast>(data: &[f64], dtype: NcType) -> NetCdfResult<Vec<T>> {
    data.iter()
        .map(|&x| {
            <T as NumCast>::from(x).ok_or_else(|| {
                NetCdfError::invalid(format!("value {} does not fit type {}", x, dtype))
            })
        })
        .collect()
}

/// Attribute payload: text or a numeric vector.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Numeric(Values),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }

    /// First numeric element, widened to double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Text(_) => None,
            Self::Numeric(v) => v.first_f64(),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        Self::Numeric(Values::Double(vec![x]))
    }
}

impl From<f32> for AttrValue {
    fn from(x: f32) -> Self {
        Self::Numeric(Values::Float(vec![x]))
    }
}

impl From<i32> for AttrValue {
    fn from(x: i32) -> Self {
        Self::Numeric(Values::Int(vec![x]))
    }
}

impl From<Values> for AttrValue {
    fn from(v: Values) -> Self {
        Self::Numeric(v)
    }
}

/// Named attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Named dimension with its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// Attribute names consulted, in order, for a variable's missing-value sentinel.
pub const MISSING_VALUE_ATTRS: [&str; 2] = ["_FillValue", "missing_value"];

/// Metadata of a variable as found in a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dtype: NcType,
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
}

impl VariableInfo {
    /// Path of the variable from the root group, e.g. `/lat`.
    pub fn full_name(&self) -> String {
        format!("/{}", self.name)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.len).collect()
    }

    /// Number of elements (1 for scalars).
    pub fn size(&self) -> usize {
        self.dimensions.iter().map(|d| d.len).product()
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// Missing-value sentinel in double precision, if the variable declares one.
    pub fn missing_value(&self) -> Option<f64> {
        MISSING_VALUE_ATTRS
            .iter()
            .find_map(|name| self.attribute(name).and_then(AttrValue::as_f64))
    }
}

/// Definition of a variable to be created in an output dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub dtype: NcType,
    pub dimensions: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl VariableDef {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, dtype: NcType, dimensions: &[S]) -> Self {
        Self {
            name: name.into(),
            dtype,
            dimensions: dimensions.iter().map(|d| d.as_ref().to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Create or overwrite an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let attr = Attribute::new(name, value);
        match self.attributes.iter_mut().find(|a| a.name == attr.name) {
            Some(existing) => existing.value = attr.value,
            None => self.attributes.push(attr),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|a| a.name != name);
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}
