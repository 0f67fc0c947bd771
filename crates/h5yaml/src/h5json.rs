//! HDF5/JSON serialization of a compiled container.
//!
//! The persisted form follows the `hdf5-json` layout used by HSDS: a root
//! group id plus `groups`, `datasets` and `datatypes` collections keyed by
//! object id. Dimension scales use the HDF5 dimension-scale attributes
//! (`CLASS`, `NAME`, `DIMENSION_LIST`); a dimension without a coordinate
//! variable is written as a netCDF-4 style placeholder dataset.
//!
//! Ids are derived from creation order and no timestamps are written, so a
//! given container always serializes to the same bytes.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use h5yaml_layout::memory::Scale;
use h5yaml_layout::{
    ArrayData, AttrValue, Dimension, Dtype, ElementType, EngineError, MemoryContainer, NamedType,
    Node, NodeKind, Number, NumericArray, StorageEngine, Variable, NETCDF_DIMENSION_MARKER,
};

pub const API_VERSION: &str = "1.1.1";

/// Top-level HDF5/JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Id of the root group.
    pub root: String,
    pub groups: BTreeMap<String, GroupJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datasets: BTreeMap<String, DatasetJson>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datatypes: BTreeMap<String, DatatypeJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupJson {
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkJson>,
}

/// Hard link from a group to a child object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkJson {
    pub class: String,
    /// `groups`, `datasets` or `datatypes`.
    pub collection: String,
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetJson {
    pub alias: Vec<String>,
    pub shape: ShapeJson,
    #[serde(rename = "type")]
    pub dtype: TypeRef,
    #[serde(rename = "creationProperties")]
    pub creation_properties: CreationProperties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatatypeJson {
    pub alias: Vec<String>,
    #[serde(rename = "type")]
    pub dtype: TypeJson,
}

/// Dataspace. `maxdims` uses `0` for an unlimited axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeJson {
    /// `H5S_SIMPLE` or `H5S_SCALAR`.
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxdims: Option<Vec<u64>>,
}

impl ShapeJson {
    fn scalar() -> Self {
        Self {
            class: "H5S_SCALAR".to_string(),
            dims: None,
            maxdims: None,
        }
    }

    fn simple(dims: Vec<u64>, maxdims: Option<Vec<u64>>) -> Self {
        Self {
            class: "H5S_SIMPLE".to_string(),
            dims: Some(dims),
            maxdims,
        }
    }
}

/// A dataset type: inline, or the id of a committed datatype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Committed(String),
    Inline(TypeJson),
}

/// Base of a type: a predefined type name or a nested type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeBase {
    Predefined(String),
    Nested(Box<TypeRef>),
}

/// String length: `H5T_VARIABLE` or a byte count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringLength {
    Variable(String),
    Fixed(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeJson {
    /// `H5T_INTEGER`, `H5T_FLOAT`, `H5T_STRING`, `H5T_COMPOUND`, ...
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeBase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldJson>>,
    #[serde(rename = "charSet", default, skip_serializing_if = "Option::is_none")]
    pub char_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<StringLength>,
    #[serde(rename = "strPad", default, skip_serializing_if = "Option::is_none")]
    pub str_pad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<BTreeMap<String, u8>>,
}

impl TypeJson {
    fn with_class(class: &str) -> Self {
        Self {
            class: class.to_string(),
            base: None,
            fields: None,
            char_set: None,
            length: None,
            str_pad: None,
            mapping: None,
        }
    }

    fn predefined(class: &str, base: &str) -> Self {
        Self {
            base: Some(TypeBase::Predefined(base.to_string())),
            ..Self::with_class(class)
        }
    }

    /// Variable-length UTF-8 string.
    fn vlen_string() -> Self {
        Self {
            char_set: Some("H5T_CSET_UTF8".to_string()),
            length: Some(StringLength::Variable("H5T_VARIABLE".to_string())),
            str_pad: Some("H5T_STR_NULLTERM".to_string()),
            ..Self::with_class("H5T_STRING")
        }
    }

    /// Fixed-length ASCII string of `n` bytes.
    fn fixed_string(n: u32) -> Self {
        Self {
            char_set: Some("H5T_CSET_ASCII".to_string()),
            length: Some(StringLength::Fixed(n)),
            str_pad: Some("H5T_STR_NULLPAD".to_string()),
            ..Self::with_class("H5T_STRING")
        }
    }

    fn primitive(dtype: Dtype) -> Self {
        match dtype {
            Dtype::Str => Self::vlen_string(),
            Dtype::FixedString(n) => Self::fixed_string(n),
            dt => {
                let class = if dt.is_float() { "H5T_FLOAT" } else { "H5T_INTEGER" };
                Self::predefined(class, dt.h5_base().unwrap_or_default())
            }
        }
    }

    fn boolean() -> Self {
        let mut mapping = BTreeMap::new();
        mapping.insert("FALSE".to_string(), 0);
        mapping.insert("TRUE".to_string(), 1);
        Self {
            mapping: Some(mapping),
            ..Self::predefined("H5T_ENUM", "H5T_STD_I8LE")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldJson {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: TypeJson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationProperties {
    pub layout: LayoutJson,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterJson>,
    #[serde(rename = "fillValue", default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutJson {
    /// `H5D_CONTIGUOUS` or `H5D_CHUNKED`.
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterJson {
    pub class: String,
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeJson {
    pub name: String,
    pub shape: ShapeJson,
    #[serde(rename = "type")]
    pub dtype: TypeJson,
    pub value: Value,
}

fn group_id(index: usize) -> String {
    format!("g-{index:08x}")
}

fn dataset_id(index: usize) -> String {
    format!("d-{index:08x}")
}

fn datatype_id(index: usize) -> String {
    format!("t-{index:08x}")
}

fn alias(path: &str) -> Vec<String> {
    vec![format!("/{path}")]
}

fn hard_link(collection: &str, id: String, title: &str) -> LinkJson {
    LinkJson {
        class: "H5L_TYPE_HARD".to_string(),
        collection: collection.to_string(),
        id,
        title: title.to_string(),
    }
}

fn string_attr(name: &str, value: &str) -> AttributeJson {
    AttributeJson {
        name: name.to_string(),
        shape: ShapeJson::scalar(),
        dtype: TypeJson::fixed_string(value.len().max(1) as u32),
        value: Value::String(value.to_string()),
    }
}

/// JSON for a number; non-finite floats become `"NaN"`, `"Infinity"` or
/// `"-Infinity"`.
fn number_json(n: Number) -> Value {
    match n {
        Number::Int(v) => Value::from(v),
        Number::UInt(v) => Value::from(v),
        Number::Float(v) if v.is_nan() => Value::String("NaN".to_string()),
        Number::Float(v) if v.is_infinite() => {
            let text = if v > 0.0 { "Infinity" } else { "-Infinity" };
            Value::String(text.to_string())
        }
        Number::Float(v) => Value::from(v),
    }
}

fn numeric_json(arr: &NumericArray) -> Vec<Value> {
    arr.to_numbers().into_iter().map(number_json).collect()
}

/// Nest a flat row-major list according to `shape`.
fn nest(flat: Vec<Value>, shape: &[u64]) -> Value {
    if shape.len() <= 1 {
        return Value::Array(flat);
    }
    let inner: u64 = shape[1..].iter().product();
    if inner == 0 {
        return Value::Array(Vec::new());
    }
    let rows = flat
        .chunks(inner as usize)
        .map(|row| nest(row.to_vec(), &shape[1..]))
        .collect();
    Value::Array(rows)
}

fn attribute_json(name: &str, value: &AttrValue) -> AttributeJson {
    let simple = |n: usize| ShapeJson::simple(vec![n as u64], None);
    let (shape, dtype, value) = match value {
        AttrValue::Bool(b) => (ShapeJson::scalar(), TypeJson::boolean(), Value::from(u8::from(*b))),
        AttrValue::I64(v) => (
            ShapeJson::scalar(),
            TypeJson::primitive(Dtype::I64),
            Value::from(*v),
        ),
        AttrValue::U64(v) => (
            ShapeJson::scalar(),
            TypeJson::primitive(Dtype::U64),
            Value::from(*v),
        ),
        AttrValue::F64(v) => (
            ShapeJson::scalar(),
            TypeJson::primitive(Dtype::F64),
            number_json(Number::Float(*v)),
        ),
        AttrValue::String(s) => (
            ShapeJson::scalar(),
            TypeJson::vlen_string(),
            Value::String(s.clone()),
        ),
        AttrValue::I64Array(v) => (
            simple(v.len()),
            TypeJson::primitive(Dtype::I64),
            Value::Array(v.iter().map(|&x| Value::from(x)).collect()),
        ),
        AttrValue::U64Array(v) => (
            simple(v.len()),
            TypeJson::primitive(Dtype::U64),
            Value::Array(v.iter().map(|&x| Value::from(x)).collect()),
        ),
        AttrValue::F64Array(v) => (
            simple(v.len()),
            TypeJson::primitive(Dtype::F64),
            Value::Array(v.iter().map(|&x| number_json(Number::Float(x))).collect()),
        ),
        AttrValue::StringArray(v) => (
            simple(v.len()),
            TypeJson::vlen_string(),
            Value::Array(v.iter().cloned().map(Value::String).collect()),
        ),
        AttrValue::Typed { data, scalar } => {
            let mut values = numeric_json(data);
            if *scalar && values.len() == 1 {
                (
                    ShapeJson::scalar(),
                    TypeJson::primitive(data.dtype()),
                    values.remove(0),
                )
            } else {
                (
                    simple(values.len()),
                    TypeJson::primitive(data.dtype()),
                    Value::Array(values),
                )
            }
        }
    };
    AttributeJson {
        name: name.to_string(),
        shape,
        dtype,
        value,
    }
}

struct Writer<'a> {
    container: &'a MemoryContainer,
    /// First dataset index available to placeholder dimension datasets.
    dim_base: usize,
}

impl Writer<'_> {
    fn element_type(&self, element: &ElementType) -> Result<TypeRef, EngineError> {
        match element {
            ElementType::Primitive(dt) => Ok(TypeRef::Inline(TypeJson::primitive(*dt))),
            ElementType::Compound { id, name, .. } | ElementType::Vlen { id, name, .. } => {
                if self.container.type_by_id(*id).is_none() {
                    return Err(EngineError::NotFound(name.clone()));
                }
                Ok(TypeRef::Committed(datatype_id(id.0)))
            }
        }
    }

    fn named_type(&self, named: &NamedType) -> Result<TypeJson, EngineError> {
        match named {
            NamedType::Compound { fields, .. } => Ok(TypeJson {
                fields: Some(
                    fields
                        .iter()
                        .map(|f| FieldJson {
                            name: f.name.clone(),
                            dtype: TypeJson::primitive(f.dtype),
                        })
                        .collect(),
                ),
                ..TypeJson::with_class("H5T_COMPOUND")
            }),
            NamedType::Vlen { base, .. } => Ok(TypeJson {
                base: Some(TypeBase::Nested(Box::new(self.element_type(base)?))),
                ..TypeJson::with_class("H5T_VLEN")
            }),
        }
    }

    /// Dataset id of the object backing dimension `dim`.
    fn dimension_dataset(&self, index: usize, dim: &Dimension) -> String {
        match &dim.scale {
            Some(Scale { variable, .. }) => dataset_id(variable.0),
            None => dataset_id(self.dim_base + index),
        }
    }

    fn variable(&self, node: &Node, var: &Variable) -> Result<DatasetJson, EngineError> {
        let props = &var.props;
        let shape = if props.shape.is_empty() {
            ShapeJson::scalar()
        } else {
            let maxdims = props.maxshape.as_ref().map(|max| {
                max.iter().map(|m| m.unwrap_or(0)).collect()
            });
            ShapeJson::simple(props.shape.clone(), maxdims)
        };

        let layout = match &props.chunk_dims {
            Some(dims) => LayoutJson {
                class: "H5D_CHUNKED".to_string(),
                dims: Some(dims.clone()),
            },
            None => LayoutJson {
                class: "H5D_CONTIGUOUS".to_string(),
                dims: None,
            },
        };
        let mut filters = Vec::new();
        if props.shuffle {
            filters.push(FilterJson {
                class: "H5Z_FILTER_SHUFFLE".to_string(),
                id: 2,
                name: "shuffle".to_string(),
                level: None,
            });
        }
        if let Some(level) = props.deflate_level {
            filters.push(FilterJson {
                class: "H5Z_FILTER_DEFLATE".to_string(),
                id: 1,
                name: "deflate".to_string(),
                level: Some(level),
            });
        }
        let fill_value = props
            .fill_value
            .as_ref()
            .and_then(|fill| numeric_json(fill).into_iter().next());

        let mut attributes = Vec::new();
        if let Some(dim) = var.scale_of {
            let scale = self
                .container
                .dimension_by_id(dim)
                .and_then(|d| d.scale.as_ref())
                .ok_or_else(|| EngineError::NotFound(node.path.clone()))?;
            attributes.push(string_attr("CLASS", "DIMENSION_SCALE"));
            attributes.push(string_attr("NAME", &scale.name));
        } else if var.dims.iter().any(Option::is_some) {
            let refs = var
                .dims
                .iter()
                .enumerate()
                .map(|(axis, dim)| {
                    let refs = match dim {
                        Some(id) => {
                            let d = self
                                .container
                                .dimension_by_id(*id)
                                .ok_or_else(|| EngineError::NotFound(format!("axis {axis}")))?;
                            vec![Value::String(format!(
                                "datasets/{}",
                                self.dimension_dataset(id.0, d)
                            ))]
                        }
                        None => Vec::new(),
                    };
                    Ok(Value::Array(refs))
                })
                .collect::<Result<Vec<_>, EngineError>>()?;
            attributes.push(AttributeJson {
                name: "DIMENSION_LIST".to_string(),
                shape: ShapeJson::simple(vec![var.dims.len() as u64], None),
                dtype: TypeJson {
                    base: Some(TypeBase::Nested(Box::new(TypeRef::Inline(
                        TypeJson::predefined("H5T_REFERENCE", "H5T_STD_REF_OBJ"),
                    )))),
                    ..TypeJson::with_class("H5T_VLEN")
                },
                value: Value::Array(refs),
            });
        }
        attributes.extend(
            node.attributes
                .iter()
                .map(|(name, value)| attribute_json(name, value)),
        );

        let value = var.data.as_ref().map(|data| match data {
            ArrayData::Numeric(arr) => nest(numeric_json(arr), &props.shape),
            ArrayData::Strings(v) => nest(
                v.iter().cloned().map(Value::String).collect(),
                &props.shape,
            ),
        });

        Ok(DatasetJson {
            alias: alias(&node.path),
            shape,
            dtype: self.element_type(&props.element)?,
            creation_properties: CreationProperties {
                layout,
                filters,
                fill_value,
            },
            attributes,
            value,
        })
    }

    /// netCDF-4 style dataset standing in for a dimension without a
    /// coordinate variable.
    fn placeholder_dimension(&self, dim: &Dimension) -> DatasetJson {
        let maxdims = if dim.is_unlimited() { 0 } else { dim.size };
        let layout = if dim.is_unlimited() {
            LayoutJson {
                class: "H5D_CHUNKED".to_string(),
                dims: Some(vec![1]),
            }
        } else {
            LayoutJson {
                class: "H5D_CONTIGUOUS".to_string(),
                dims: None,
            }
        };
        DatasetJson {
            alias: alias(&dim.path),
            shape: ShapeJson::simple(vec![dim.size], Some(vec![maxdims])),
            dtype: TypeRef::Inline(TypeJson::primitive(Dtype::F32)),
            creation_properties: CreationProperties {
                layout,
                filters: Vec::new(),
                fill_value: None,
            },
            attributes: vec![
                string_attr("CLASS", "DIMENSION_SCALE"),
                string_attr(
                    "NAME",
                    &format!("{NETCDF_DIMENSION_MARKER}{:>10}", dim.size),
                ),
            ],
            value: None,
        }
    }

    fn document(&self) -> Result<Document, EngineError> {
        let c = self.container;
        let mut groups = BTreeMap::new();
        let mut datasets = BTreeMap::new();
        let mut datatypes = BTreeMap::new();
        let mut links: BTreeMap<String, Vec<LinkJson>> = BTreeMap::new();

        let parent_of = |path: &str| -> String {
            path.rsplit_once('/')
                .map_or(String::new(), |(head, _)| head.to_string())
        };
        let title_of = |path: &str| -> String {
            path.rsplit_once('/')
                .map_or(path.to_string(), |(_, tail)| tail.to_string())
        };

        for (id, node) in c.nodes() {
            match &node.kind {
                NodeKind::Group => {
                    if !node.path.is_empty() {
                        links
                            .entry(parent_of(&node.path))
                            .or_default()
                            .push(hard_link("groups", group_id(id.0), &title_of(&node.path)));
                    }
                }
                NodeKind::Variable(var) => {
                    links
                        .entry(parent_of(&node.path))
                        .or_default()
                        .push(hard_link("datasets", dataset_id(id.0), &title_of(&node.path)));
                    datasets.insert(dataset_id(id.0), self.variable(node, var)?);
                }
            }
        }
        for (id, dim) in c.dimensions() {
            if dim.scale.is_some() {
                continue;
            }
            let ds = dataset_id(self.dim_base + id.0);
            links
                .entry(parent_of(&dim.path))
                .or_default()
                .push(hard_link("datasets", ds.clone(), &title_of(&dim.path)));
            datasets.insert(ds, self.placeholder_dimension(dim));
        }
        for (id, named) in c.types() {
            links
                .entry(String::new())
                .or_default()
                .push(hard_link("datatypes", datatype_id(id.0), named.name()));
            datatypes.insert(
                datatype_id(id.0),
                DatatypeJson {
                    alias: alias(named.name()),
                    dtype: self.named_type(named)?,
                },
            );
        }

        for (id, node) in c.nodes() {
            if let NodeKind::Group = node.kind {
                groups.insert(
                    group_id(id.0),
                    GroupJson {
                        alias: alias(&node.path),
                        attributes: node
                            .attributes
                            .iter()
                            .map(|(name, value)| attribute_json(name, value))
                            .collect(),
                        links: links.remove(&node.path).unwrap_or_default(),
                    },
                );
            }
        }

        Ok(Document {
            api_version: API_VERSION.to_string(),
            root: group_id(c.root().0),
            groups,
            datasets,
            datatypes,
        })
    }
}

/// Build the HDF5/JSON document of `container`.
pub fn to_document(container: &MemoryContainer) -> Result<Document, EngineError> {
    let writer = Writer {
        container,
        dim_base: container.nodes().count(),
    };
    writer.document()
}

/// Serialize `container` as pretty-printed HDF5/JSON.
pub fn write<W: Write>(container: &MemoryContainer, out: W) -> Result<(), EngineError> {
    let doc = to_document(container)?;
    serde_json::to_writer_pretty(out, &doc).map_err(io::Error::from)?;
    Ok(())
}
