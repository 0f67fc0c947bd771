//! Attribute values and typed numeric arrays.
//!
//! Schema documents hand back loosely typed literals (`I64`, `F64`, strings and
//! lists of those). Storage engines are strict about widths, so values that
//! must agree with an element type are pinned into a [`NumericArray`].

use std::fmt;

use half::f16;

use crate::dtype::Dtype;

/// A single untyped numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Integer view of the literal, if it is integral and fits in `i64`.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(v),
            Number::UInt(v) => i64::try_from(v).ok(),
            Number::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::UInt(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Why a literal could not be converted to a storage type.
#[derive(Debug, Clone, PartialEq)]
pub enum CastError {
    /// The target type does not hold numbers.
    NotNumeric(Dtype),
    /// The literal does not fit in the target type.
    OutOfRange { value: Number, dtype: Dtype },
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastError::NotNumeric(dt) => write!(f, "type {dt} is not numeric"),
            CastError::OutOfRange { value, dtype } => {
                write!(f, "value {value} does not fit in type {dtype}")
            }
        }
    }
}

impl std::error::Error for CastError {}

/// A numeric array stored at an explicit element width.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

fn cast_int<T>(dtype: Dtype, n: Number) -> Result<T, CastError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    let out_of_range = || CastError::OutOfRange { value: n, dtype };
    match n {
        Number::Int(v) => <T as TryFrom<i64>>::try_from(v).map_err(|_| out_of_range()),
        Number::UInt(v) => <T as TryFrom<u64>>::try_from(v).map_err(|_| out_of_range()),
        Number::Float(v) => {
            // Floats truncate toward zero, like a C cast.
            if !v.is_finite() {
                return Err(out_of_range());
            }
            let t = v.trunc();
            if t < 0.0 && t >= i64::MIN as f64 {
                <T as TryFrom<i64>>::try_from(t as i64).map_err(|_| out_of_range())
            } else if t >= 0.0 && t < u64::MAX as f64 {
                <T as TryFrom<u64>>::try_from(t as u64).map_err(|_| out_of_range())
            } else {
                Err(out_of_range())
            }
        }
    }
}

fn cast_all<T>(
    values: &[Number],
    cast: impl Fn(Number) -> Result<T, CastError>,
) -> Result<Vec<T>, CastError> {
    values.iter().map(|&n| cast(n)).collect()
}

impl NumericArray {
    /// Convert untyped literals to `dtype`.
    pub fn from_numbers(dtype: Dtype, values: &[Number]) -> Result<Self, CastError> {
        let arr = match dtype {
            Dtype::I8 => NumericArray::I8(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::I16 => NumericArray::I16(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::I32 => NumericArray::I32(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::I64 => NumericArray::I64(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::U8 => NumericArray::U8(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::U16 => NumericArray::U16(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::U32 => NumericArray::U32(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::U64 => NumericArray::U64(cast_all(values, |n| cast_int(dtype, n))?),
            Dtype::F16 => {
                NumericArray::F16(values.iter().map(|n| f16::from_f64(n.as_f64())).collect())
            }
            Dtype::F32 => NumericArray::F32(values.iter().map(|n| n.as_f64() as f32).collect()),
            Dtype::F64 => NumericArray::F64(values.iter().map(|n| n.as_f64()).collect()),
            Dtype::Str | Dtype::FixedString(_) => return Err(CastError::NotNumeric(dtype)),
        };
        Ok(arr)
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            NumericArray::I8(_) => Dtype::I8,
            NumericArray::I16(_) => Dtype::I16,
            NumericArray::I32(_) => Dtype::I32,
            NumericArray::I64(_) => Dtype::I64,
            NumericArray::U8(_) => Dtype::U8,
            NumericArray::U16(_) => Dtype::U16,
            NumericArray::U32(_) => Dtype::U32,
            NumericArray::U64(_) => Dtype::U64,
            NumericArray::F16(_) => Dtype::F16,
            NumericArray::F32(_) => Dtype::F32,
            NumericArray::F64(_) => Dtype::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NumericArray::I8(v) => v.len(),
            NumericArray::I16(v) => v.len(),
            NumericArray::I32(v) => v.len(),
            NumericArray::I64(v) => v.len(),
            NumericArray::U8(v) => v.len(),
            NumericArray::U16(v) => v.len(),
            NumericArray::U32(v) => v.len(),
            NumericArray::U64(v) => v.len(),
            NumericArray::F16(v) => v.len(),
            NumericArray::F32(v) => v.len(),
            NumericArray::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen every element back to an untyped literal.
    pub fn to_numbers(&self) -> Vec<Number> {
        match self {
            NumericArray::I8(v) => v.iter().map(|&x| Number::Int(x.into())).collect(),
            NumericArray::I16(v) => v.iter().map(|&x| Number::Int(x.into())).collect(),
            NumericArray::I32(v) => v.iter().map(|&x| Number::Int(x.into())).collect(),
            NumericArray::I64(v) => v.iter().map(|&x| Number::Int(x)).collect(),
            NumericArray::U8(v) => v.iter().map(|&x| Number::UInt(x.into())).collect(),
            NumericArray::U16(v) => v.iter().map(|&x| Number::UInt(x.into())).collect(),
            NumericArray::U32(v) => v.iter().map(|&x| Number::UInt(x.into())).collect(),
            NumericArray::U64(v) => v.iter().map(|&x| Number::UInt(x)).collect(),
            NumericArray::F16(v) => v.iter().map(|x| Number::Float(x.to_f64())).collect(),
            NumericArray::F32(v) => v.iter().map(|&x| Number::Float(x.into())).collect(),
            NumericArray::F64(v) => v.iter().map(|&x| Number::Float(x)).collect(),
        }
    }
}

/// An attribute value as handed to a storage engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    I64Array(Vec<i64>),
    /// Integer list with an entry above `i64::MAX`.
    U64Array(Vec<u64>),
    F64Array(Vec<f64>),
    StringArray(Vec<String>),
    /// Numbers pinned to an element width. `scalar` distinguishes a single
    /// value from a one-element array.
    Typed { data: NumericArray, scalar: bool },
}

impl AttrValue {
    /// A typed scalar.
    pub fn typed_scalar(data: NumericArray) -> Self {
        AttrValue::Typed { data, scalar: true }
    }

    /// A typed one-dimensional array.
    pub fn typed_array(data: NumericArray) -> Self {
        AttrValue::Typed {
            data,
            scalar: false,
        }
    }

    /// Numeric view of the value: the literals plus whether it was a scalar.
    /// Returns `None` for strings and booleans.
    pub fn numbers(&self) -> Option<(Vec<Number>, bool)> {
        match self {
            AttrValue::I64(v) => Some((vec![Number::Int(*v)], true)),
            AttrValue::U64(v) => Some((vec![Number::UInt(*v)], true)),
            AttrValue::F64(v) => Some((vec![Number::Float(*v)], true)),
            AttrValue::I64Array(v) => Some((v.iter().map(|&x| Number::Int(x)).collect(), false)),
            AttrValue::U64Array(v) => Some((v.iter().map(|&x| Number::UInt(x)).collect(), false)),
            AttrValue::F64Array(v) => {
                Some((v.iter().map(|&x| Number::Float(x)).collect(), false))
            }
            AttrValue::Typed { data, scalar } => Some((data.to_numbers(), *scalar)),
            AttrValue::Bool(_) | AttrValue::String(_) | AttrValue::StringArray(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is exactly the placeholder string `sentinel`.
    pub fn is_placeholder(&self, sentinel: &str) -> bool {
        self.as_str() == Some(sentinel)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::I64(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::F64(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::StringArray(v)
    }
}

/// Bulk data written into a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Numeric(NumericArray),
    Strings(Vec<String>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Numeric(arr) => arr.len(),
            ArrayData::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
