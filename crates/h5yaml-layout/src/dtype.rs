//! Element type codes.
//!
//! Schemas name element types with numpy-style codes (`f4`, `u1`, `i8`, ...).
//! This module maps those codes to a closed set of primitive types and exposes
//! their storage width and HDF5 naming.

use std::fmt;

/// Size in bytes of a variable-length element descriptor (length + pointer).
pub const VLEN_DESCRIPTOR_SIZE: usize = 16;

/// Primitive element types supported by the layout compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// Signed 8-bit integer (`i1`).
    I8,
    /// Signed 16-bit integer (`i2`).
    I16,
    /// Signed 32-bit integer (`i4`).
    I32,
    /// Signed 64-bit integer (`i8`).
    I64,
    /// Unsigned 8-bit integer (`u1`).
    U8,
    /// Unsigned 16-bit integer (`u2`).
    U16,
    /// Unsigned 32-bit integer (`u4`).
    U32,
    /// Unsigned 64-bit integer (`u8`).
    U64,
    /// IEEE half precision (`f2`).
    F16,
    /// IEEE single precision (`f4`).
    F32,
    /// IEEE double precision (`f8`).
    F64,
    /// Variable-length UTF-8 string (`str`).
    Str,
    /// Fixed-length byte string (`S<n>`).
    FixedString(u32),
}

impl Dtype {
    /// Parse a type code. Returns `None` for codes that are not primitive
    /// (for example the name of a compound type).
    ///
    /// A leading little-endian / native / not-applicable marker (`<`, `=`, `|`)
    /// is accepted and ignored.
    pub fn parse(code: &str) -> Option<Dtype> {
        let code = code.trim().trim_start_matches(['<', '=', '|']);
        let dt = match code {
            "i1" | "int8" | "b" => Dtype::I8,
            "i2" | "int16" => Dtype::I16,
            "i4" | "int32" => Dtype::I32,
            "i8" | "int64" => Dtype::I64,
            "u1" | "uint8" | "B" => Dtype::U8,
            "u2" | "uint16" => Dtype::U16,
            "u4" | "uint32" => Dtype::U32,
            "u8" | "uint64" => Dtype::U64,
            "f2" | "float16" => Dtype::F16,
            "f4" | "float32" => Dtype::F32,
            "f8" | "float64" => Dtype::F64,
            "str" | "string" => Dtype::Str,
            _ => {
                let width = code.strip_prefix('S')?;
                let n: u32 = width.parse().ok()?;
                if n == 0 {
                    return None;
                }
                Dtype::FixedString(n)
            }
        };
        Some(dt)
    }

    /// Storage width of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Dtype::I8 | Dtype::U8 => 1,
            Dtype::I16 | Dtype::U16 | Dtype::F16 => 2,
            Dtype::I32 | Dtype::U32 | Dtype::F32 => 4,
            Dtype::I64 | Dtype::U64 | Dtype::F64 => 8,
            Dtype::Str => VLEN_DESCRIPTOR_SIZE,
            Dtype::FixedString(n) => *n as usize,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Dtype::I8
                | Dtype::I16
                | Dtype::I32
                | Dtype::I64
                | Dtype::U8
                | Dtype::U16
                | Dtype::U32
                | Dtype::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Dtype::F16 | Dtype::F32 | Dtype::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Dtype::Str | Dtype::FixedString(_))
    }

    /// HDF5 predefined type name (little-endian), e.g. `H5T_IEEE_F32LE`.
    /// Strings have no predefined base and return `None`.
    pub fn h5_base(&self) -> Option<&'static str> {
        let name = match self {
            Dtype::I8 => "H5T_STD_I8LE",
            Dtype::I16 => "H5T_STD_I16LE",
            Dtype::I32 => "H5T_STD_I32LE",
            Dtype::I64 => "H5T_STD_I64LE",
            Dtype::U8 => "H5T_STD_U8LE",
            Dtype::U16 => "H5T_STD_U16LE",
            Dtype::U32 => "H5T_STD_U32LE",
            Dtype::U64 => "H5T_STD_U64LE",
            Dtype::F16 => "H5T_IEEE_F16LE",
            Dtype::F32 => "H5T_IEEE_F32LE",
            Dtype::F64 => "H5T_IEEE_F64LE",
            Dtype::Str | Dtype::FixedString(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::I8 => write!(f, "i1"),
            Dtype::I16 => write!(f, "i2"),
            Dtype::I32 => write!(f, "i4"),
            Dtype::I64 => write!(f, "i8"),
            Dtype::U8 => write!(f, "u1"),
            Dtype::U16 => write!(f, "u2"),
            Dtype::U32 => write!(f, "u4"),
            Dtype::U64 => write!(f, "u8"),
            Dtype::F16 => write!(f, "f2"),
            Dtype::F32 => write!(f, "f4"),
            Dtype::F64 => write!(f, "f8"),
            Dtype::Str => write!(f, "str"),
            Dtype::FixedString(n) => write!(f, "S{n}"),
        }
    }
}
