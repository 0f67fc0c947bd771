//! Conversion of raw YAML documents into the typed schema model.
//!
//! Underscore-prefixed keys of a dimension or variable entry are control
//! fields; every other key becomes a descriptive attribute.

use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use h5yaml_layout::schema::{DimensionControl, VariableControl};
use h5yaml_layout::{
    Attributes, AttrValue, ChunkSpec, CompoundSpec, DimensionSpec, Dims, FieldSpec, FillSpec,
    Number, SchemaDefinition, ValidationError, VariableSpec,
};

/// One converted document: its definition plus any compound include files
/// it lists.
#[derive(Debug, Default)]
pub struct Converted {
    pub definition: SchemaDefinition,
    pub includes: Vec<String>,
}

fn invalid(node: impl Into<String>, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidSpec {
        node: node.into(),
        reason: reason.into(),
    }
}

/// Convert a top-level document mapping.
pub fn document(doc: &Mapping) -> Result<Converted, ValidationError> {
    let mut out = Converted::default();
    for (key, value) in doc {
        let section = key
            .as_str()
            .ok_or_else(|| invalid("<document>", "section names must be strings"))?;
        if value.is_null() {
            continue;
        }
        let def = &mut out.definition;
        match section {
            "groups" => {
                let seq = value
                    .as_sequence()
                    .ok_or_else(|| invalid("groups", "expected a list of group paths"))?;
                for item in seq {
                    def.groups.insert(string(item, "groups")?);
                }
            }
            "attrs_global" => def.attrs_global.extend(attributes(value, "attrs_global")?),
            "attrs_group" | "attrs_groups" => {
                def.attrs_group.extend(attributes(value, section)?)
            }
            "compounds" => match value {
                Value::Sequence(seq) => {
                    for item in seq {
                        out.includes.push(string(item, "compounds")?);
                    }
                }
                Value::Mapping(map) => def.compounds.extend(compounds(map)?),
                _ => return Err(invalid("compounds", "expected a mapping or a list of files")),
            },
            "dimensions" => {
                for (name, entry) in entries(value, "dimensions")? {
                    let spec = dimension(&name, entry)?;
                    def.dimensions.insert(name, spec);
                }
            }
            "variables" => {
                for (name, entry) in entries(value, "variables")? {
                    let spec = variable(&name, entry)?;
                    def.variables.insert(name, spec);
                }
            }
            other => debug!("ignoring unknown section {other}"),
        }
    }
    Ok(out)
}

/// Compound definitions: name → { field → [dtype, units?, long_name?] }.
pub fn compounds(map: &Mapping) -> Result<Vec<(String, CompoundSpec)>, ValidationError> {
    let mut out = Vec::with_capacity(map.len());
    for (name, fields) in map {
        let name = string(name, "compounds")?;
        let fields = fields
            .as_mapping()
            .ok_or_else(|| invalid(&name, "expected a mapping of fields"))?;
        let mut spec = CompoundSpec::new();
        for (field, parts) in fields {
            let field = string(field, &name)?;
            let node = format!("{name}.{field}");
            let parts = match parts {
                Value::Sequence(seq) => seq
                    .iter()
                    .map(|p| scalar_string(p, &node))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![scalar_string(other, &node)?],
            };
            let field_spec = FieldSpec::from_positional(field, &parts)
                .ok_or_else(|| invalid(&node, "field spec takes 1 to 3 entries"))?;
            spec = spec.field(field_spec);
        }
        out.push((name, spec));
    }
    Ok(out)
}

fn dimension(name: &str, entry: &Mapping) -> Result<DimensionSpec, ValidationError> {
    let mut control = DimensionControl::default();
    let mut size = None;
    let mut attrs = Attributes::new();
    for (key, value) in entry {
        let key = string(key, name)?;
        match key.as_str() {
            "_size" => size = Some(unsigned(value, name, "_size")?),
            "_dtype" => control.dtype = Some(string(value, name)?),
            "_values" => {
                control.values = Some(attr_value(value).map_err(|r| invalid(name, r))?)
            }
            "_range" => control.range = Some(numbers(value, name, "_range")?),
            "_chunks" => control.chunks = Some(chunks(value, name)?),
            "_FillValue" => control.fill_value = Some(fill_value(value, name)?),
            k if k.starts_with('_') => warn!("{name}: unknown control field {k} ignored"),
            _ => {
                let value = attr_value(value).map_err(|r| invalid(name, format!("{key}: {r}")))?;
                attrs.insert(key, value);
            }
        }
    }
    control.size = size.ok_or_else(|| invalid(name, "missing _size"))?;
    Ok(DimensionSpec {
        control,
        attributes: attrs,
    })
}

fn variable(name: &str, entry: &Mapping) -> Result<VariableSpec, ValidationError> {
    let mut dtype = None;
    let mut dims = None;
    let mut fill = None;
    let mut chunk_spec = None;
    let mut compression = None;
    let mut vlen = false;
    let mut attrs = Attributes::new();
    for (key, value) in entry {
        let key = string(key, name)?;
        match key.as_str() {
            "_dtype" => dtype = Some(string(value, name)?),
            "_dims" => {
                let seq = value
                    .as_sequence()
                    .ok_or_else(|| invalid(name, "_dims must be a list"))?;
                let axes = seq
                    .iter()
                    .map(|v| string(v, name))
                    .collect::<Result<Vec<_>, _>>()?;
                dims = Some(if axes.len() == 1 && axes[0] == "scalar" {
                    Dims::Scalar
                } else {
                    Dims::Axes(axes)
                });
            }
            "_FillValue" => fill = Some(fill_value(value, name)?),
            "_chunks" => chunk_spec = Some(chunks(value, name)?),
            "_compression" => {
                let level = unsigned(value, name, "_compression")?;
                compression = Some(
                    u32::try_from(level)
                        .map_err(|_| invalid(name, "_compression level out of range"))?,
                );
            }
            "_vlen" => {
                vlen = value
                    .as_bool()
                    .ok_or_else(|| invalid(name, "_vlen must be a boolean"))?
            }
            k if k.starts_with('_') => warn!("{name}: unknown control field {k} ignored"),
            _ => {
                let value = attr_value(value).map_err(|r| invalid(name, format!("{key}: {r}")))?;
                attrs.insert(key, value);
            }
        }
    }
    Ok(VariableSpec {
        control: VariableControl {
            dtype: dtype.ok_or_else(|| invalid(name, "missing _dtype"))?,
            dims: dims.ok_or_else(|| invalid(name, "missing _dims"))?,
            fill_value: fill,
            chunks: chunk_spec,
            compression,
            vlen,
        },
        attributes: attrs,
    })
}

/// Convert a YAML attribute literal.
pub fn attr_value(value: &Value) -> Result<AttrValue, String> {
    match value {
        Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        Value::Number(n) => Ok(match number(n) {
            Number::Int(v) => AttrValue::I64(v),
            Number::UInt(v) => AttrValue::U64(v),
            Number::Float(v) => AttrValue::F64(v),
        }),
        Value::String(s) => Ok(AttrValue::String(s.clone())),
        Value::Sequence(seq) => sequence_value(seq),
        Value::Tagged(tagged) => attr_value(&tagged.value),
        Value::Null => Err("empty value".to_string()),
        Value::Mapping(_) => Err("nested mappings are not attribute values".to_string()),
    }
}

fn sequence_value(seq: &[Value]) -> Result<AttrValue, String> {
    if seq.iter().all(Value::is_string) {
        let strings = seq.iter().filter_map(|v| v.as_str().map(String::from));
        return Ok(AttrValue::StringArray(strings.collect()));
    }
    let mut nums = Vec::with_capacity(seq.len());
    for item in seq {
        match item {
            Value::Number(n) => nums.push(number(n)),
            _ => return Err("lists must hold only numbers or only strings".to_string()),
        }
    }
    let ints: Option<Vec<i64>> = nums
        .iter()
        .map(|n| match n {
            Number::Int(v) => Some(*v),
            _ => None,
        })
        .collect();
    if let Some(ints) = ints {
        return Ok(AttrValue::I64Array(ints));
    }
    let uints: Option<Vec<u64>> = nums
        .iter()
        .map(|n| match n {
            Number::Int(v) => u64::try_from(*v).ok(),
            Number::UInt(v) => Some(*v),
            Number::Float(_) => None,
        })
        .collect();
    match uints {
        Some(uints) => Ok(AttrValue::U64Array(uints)),
        None => Ok(AttrValue::F64Array(nums.iter().map(|n| n.as_f64()).collect())),
    }
}

fn number(n: &serde_yaml::Number) -> Number {
    if let Some(v) = n.as_i64() {
        Number::Int(v)
    } else if let Some(v) = n.as_u64() {
        Number::UInt(v)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn numbers(value: &Value, node: &str, field: &str) -> Result<Vec<Number>, ValidationError> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| invalid(node, format!("{field} must be a list of numbers")))?;
    seq.iter()
        .map(|v| match v {
            Value::Number(n) => Ok(number(n)),
            _ => Err(invalid(node, format!("{field} must be a list of numbers"))),
        })
        .collect()
}

fn unsigned(value: &Value, node: &str, field: &str) -> Result<u64, ValidationError> {
    value
        .as_u64()
        .ok_or_else(|| invalid(node, format!("{field} must be a non-negative integer")))
}

fn chunks(value: &Value, node: &str) -> Result<ChunkSpec, ValidationError> {
    match value {
        Value::String(s) if s == "contiguous" => Ok(ChunkSpec::Contiguous),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| unsigned(v, node, "_chunks"))
            .collect::<Result<Vec<_>, _>>()
            .map(ChunkSpec::Shape),
        _ => Err(invalid(
            node,
            "_chunks must be \"contiguous\" or a list of chunk extents",
        )),
    }
}

fn fill_value(value: &Value, node: &str) -> Result<FillSpec, ValidationError> {
    match value {
        Value::Number(n) => {
            let n = number(n);
            match n {
                Number::Float(v) if v.is_nan() => Ok(FillSpec::NaN),
                _ => Ok(FillSpec::Number(n)),
            }
        }
        Value::String(s) if s.eq_ignore_ascii_case("nan") => Ok(FillSpec::NaN),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                Ok(FillSpec::Number(Number::Int(v)))
            } else if let Ok(v) = s.parse::<u64>() {
                Ok(FillSpec::Number(Number::UInt(v)))
            } else if let Ok(v) = s.parse::<f64>() {
                Ok(FillSpec::Number(Number::Float(v)))
            } else {
                Err(invalid(node, format!("_FillValue {s:?} is not a number")))
            }
        }
        _ => Err(invalid(node, "_FillValue must be a number or a numeric string")),
    }
}

fn entries<'a>(
    value: &'a Value,
    section: &str,
) -> Result<Vec<(String, &'a Mapping)>, ValidationError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| invalid(section, "expected a mapping"))?;
    map.iter()
        .map(|(k, v)| {
            let name = string(k, section)?;
            let entry = v
                .as_mapping()
                .ok_or_else(|| invalid(&name, "expected a mapping of fields"))?;
            Ok((name, entry))
        })
        .collect()
}

fn attributes(value: &Value, section: &str) -> Result<Attributes, ValidationError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| invalid(section, "expected a mapping"))?;
    let mut attrs = Attributes::new();
    for (k, v) in map {
        let name = string(k, section)?;
        let value = attr_value(v).map_err(|r| invalid(section, format!("{name}: {r}")))?;
        attrs.insert(name, value);
    }
    Ok(attrs)
}

fn string(value: &Value, node: &str) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| invalid(node, format!("expected a string, got {value:?}")))
}

/// Like [`string`], but numbers and booleans are rendered as text.
fn scalar_string(value: &Value, node: &str) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(node, "expected a scalar")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h5yaml_layout::NumericArray;

    fn doc(text: &str) -> Mapping {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn control_fields_and_attributes_are_split() {
        let converted = document(&doc(
            r#"
dimensions:
  x:
    _size: 3
    _dtype: u2
    _values: [1, 2, 3]
    long_name: x index
variables:
  temp:
    _dtype: f4
    _dims: [time, x]
    _FillValue: NaN
    _compression: 4
    units: K
    valid_range: [150.0, 350.0]
"#,
        ))
        .unwrap();
        let def = converted.definition;
        let x = &def.dimensions["x"];
        assert_eq!(x.control.size, 3);
        assert_eq!(x.control.dtype.as_deref(), Some("u2"));
        assert_eq!(x.control.values, Some(AttrValue::I64Array(vec![1, 2, 3])));
        assert_eq!(x.attributes["long_name"], AttrValue::from("x index"));

        let temp = &def.variables["temp"];
        assert_eq!(temp.control.fill_value, Some(FillSpec::NaN));
        assert_eq!(temp.control.compression, Some(4));
        assert_eq!(temp.control.dims, Dims::axes(&["time", "x"]));
        assert_eq!(temp.attributes.len(), 2);
        assert_eq!(
            temp.attributes["valid_range"],
            AttrValue::F64Array(vec![150.0, 350.0])
        );
    }

    #[test]
    fn scalar_dims_and_contiguous() {
        let converted = document(&doc(
            r#"
variables:
  orbit:
    _dtype: i4
    _dims: [scalar]
    _FillValue: "-1"
  image:
    _dtype: u2
    _dims: [row, column]
    _chunks: contiguous
  spectra:
    _dtype: f4
    _dims: [time]
    _chunks: [64]
    _vlen: true
"#,
        ))
        .unwrap();
        let vars = &converted.definition.variables;
        assert_eq!(vars["orbit"].control.dims, Dims::Scalar);
        assert_eq!(
            vars["orbit"].control.fill_value,
            Some(FillSpec::Number(Number::Int(-1)))
        );
        assert_eq!(vars["image"].control.chunks, Some(ChunkSpec::Contiguous));
        assert_eq!(vars["spectra"].control.chunks, Some(ChunkSpec::Shape(vec![64])));
        assert!(vars["spectra"].control.vlen);
    }

    #[test]
    fn compound_forms() {
        let converted = document(&doc(
            r#"
compounds:
  geo_t:
    lat: [f4, degrees_north, latitude]
    lon: [f4, degrees_east, longitude]
    flag: [u1, quality flag]
"#,
        ))
        .unwrap();
        let geo = &converted.definition.compounds["geo_t"];
        assert_eq!(geo.fields.len(), 3);
        assert_eq!(geo.fields[0].units.as_deref(), Some("degrees_north"));
        assert_eq!(geo.fields[2].units, None);
        assert_eq!(geo.fields[2].long_name.as_deref(), Some("quality flag"));

        let converted = document(&doc("compounds: [geo.yaml, time.yaml]\n")).unwrap();
        assert_eq!(converted.includes, vec!["geo.yaml", "time.yaml"]);
        assert!(converted.definition.compounds.is_empty());
    }

    #[test]
    fn both_group_attribute_spellings() {
        let converted = document(&doc(
            r#"
attrs_global:
  title: demo
  history: TBW
attrs_groups:
  /science/processor: v1
attrs_group:
  science/level: 2
"#,
        ))
        .unwrap();
        let def = converted.definition;
        assert_eq!(def.attrs_global.len(), 2);
        assert_eq!(def.attrs_group["/science/processor"], AttrValue::from("v1"));
        assert_eq!(def.attrs_group["science/level"], AttrValue::I64(2));
    }

    #[test]
    fn malformed_entries() {
        let err = document(&doc("variables:\n  v:\n    _dims: [x]\n")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSpec { .. }));
        let err = document(&doc("dimensions:\n  x:\n    _dtype: f4\n")).unwrap_err();
        assert!(err.to_string().contains("_size"));
        let err = document(&doc("dimensions:\n  x:\n    _size: -1\n")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSpec { .. }));
        assert!(document(&doc("groups: science\n")).is_err());
        assert!(document(&doc("compounds:\n  t:\n    a: [f4, a, b, c]\n")).is_err());
    }

    #[test]
    fn attribute_literals() {
        assert_eq!(attr_value(&Value::Bool(true)).unwrap(), AttrValue::Bool(true));
        let v: Value = serde_yaml::from_str("[1, 2.5]").unwrap();
        assert_eq!(attr_value(&v).unwrap(), AttrValue::F64Array(vec![1.0, 2.5]));
        let v: Value = serde_yaml::from_str("[a, 1]").unwrap();
        assert!(attr_value(&v).is_err());
        let v: Value = serde_yaml::from_str("[]").unwrap();
        assert_eq!(attr_value(&v).unwrap(), AttrValue::StringArray(vec![]));
        assert!(attr_value(&Value::Null).is_err());
    }

    #[test]
    fn large_unsigned_lists_stay_exact() {
        let v: Value = serde_yaml::from_str("[1, 9223372036854775809]").unwrap();
        let raw = attr_value(&v).unwrap();
        assert_eq!(raw, AttrValue::U64Array(vec![1, 9_223_372_036_854_775_809]));

        let masks = h5yaml_layout::coerce("u8", "flag_masks", raw).unwrap();
        assert_eq!(
            masks,
            AttrValue::typed_array(NumericArray::U64(vec![1, 9_223_372_036_854_775_809]))
        );
        // Out of range for the variable type instead of silently rounded.
        let v: Value = serde_yaml::from_str("[0, 18446744073709551615]").unwrap();
        assert!(h5yaml_layout::coerce("u1", "valid_range", attr_value(&v).unwrap()).is_err());

        // Negative entries mixed with huge ones fall back to floats.
        let v: Value = serde_yaml::from_str("[-1, 9223372036854775809]").unwrap();
        assert!(matches!(attr_value(&v).unwrap(), AttrValue::F64Array(_)));
    }
}
