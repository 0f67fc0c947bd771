//! Attribute coercion.
//!
//! Range-checking metadata (`valid_min`, `valid_max`, `valid_range`) and flag
//! tables (`flag_values`, `flag_masks`) must share the element type of the
//! variable they describe. A YAML literal arrives as a 64-bit integer or
//! double; [`coerce`] pins it to the variable's width.

use crate::dtype::Dtype;
use crate::value::{AttrValue, CastError, NumericArray};

/// Element type used for `flag_values` / `flag_masks`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlagWidth {
    /// Use the variable's own element type.
    #[default]
    MatchVariable,
    /// Always store flags as unsigned bytes (`u1`).
    UnsignedByte,
}

/// Coerce `value` for attribute `name` on a variable of type `dtype_code`,
/// using [`FlagWidth::MatchVariable`].
pub fn coerce(dtype_code: &str, name: &str, value: AttrValue) -> Result<AttrValue, CastError> {
    coerce_with(dtype_code, name, value, FlagWidth::default())
}

/// Coerce `value` for attribute `name` on a variable of type `dtype_code`.
///
/// Unknown or non-numeric type codes, non-numeric values and attribute names
/// outside the numerically sensitive set pass through unchanged.
pub fn coerce_with(
    dtype_code: &str,
    name: &str,
    value: AttrValue,
    flags: FlagWidth,
) -> Result<AttrValue, CastError> {
    let Some(dtype) = Dtype::parse(dtype_code).filter(Dtype::is_numeric) else {
        return Ok(value);
    };
    let target = match name {
        "valid_min" | "valid_max" | "valid_range" => dtype,
        "flag_values" | "flag_masks" => match flags {
            FlagWidth::MatchVariable => dtype,
            FlagWidth::UnsignedByte => Dtype::U8,
        },
        _ => return Ok(value),
    };
    let Some((numbers, scalar)) = value.numbers() else {
        return Ok(value);
    };

    let data = NumericArray::from_numbers(target, &numbers)?;
    // Flag tables are always arrays, even with a single entry.
    if scalar && !name.starts_with("flag_") {
        Ok(AttrValue::typed_scalar(data))
    } else {
        Ok(AttrValue::typed_array(data))
    }
}
