//! In-memory schema model.
//!
//! A [`SchemaDefinition`] is the merged form of one or more schema documents.
//! Specs separate storage *control* fields (the underscore-prefixed keys of a
//! document) from free-form descriptive *attributes*, which are copied onto the
//! created node.

use indexmap::{IndexMap, IndexSet};

use crate::value::{AttrValue, Number};

/// Ordered attribute bag.
pub type Attributes = IndexMap<String, AttrValue>;

/// Merged schema definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDefinition {
    /// Group paths to create.
    pub groups: IndexSet<String>,
    /// Attributes of the root group.
    pub attrs_global: Attributes,
    /// Path-qualified attributes (`group_or_variable/attr_name`).
    pub attrs_group: Attributes,
    /// Named compound types.
    pub compounds: IndexMap<String, CompoundSpec>,
    /// Dimensions keyed by path.
    pub dimensions: IndexMap<String, DimensionSpec>,
    /// Variables keyed by path.
    pub variables: IndexMap<String, VariableSpec>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` into `self`: groups are unioned, every mapping section is
    /// overwritten key by key.
    pub fn merge(&mut self, other: SchemaDefinition) {
        self.groups.extend(other.groups);
        self.attrs_global.extend(other.attrs_global);
        self.attrs_group.extend(other.attrs_group);
        self.compounds.extend(other.compounds);
        self.dimensions.extend(other.dimensions);
        self.variables.extend(other.variables);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.attrs_global.is_empty()
            && self.attrs_group.is_empty()
            && self.compounds.is_empty()
            && self.dimensions.is_empty()
            && self.variables.is_empty()
    }

    pub fn group(mut self, path: impl Into<String>) -> Self {
        self.groups.insert(path.into());
        self
    }

    pub fn global_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs_global.insert(name.into(), value.into());
        self
    }

    pub fn group_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs_group.insert(key.into(), value.into());
        self
    }

    pub fn compound(mut self, name: impl Into<String>, spec: CompoundSpec) -> Self {
        self.compounds.insert(name.into(), spec);
        self
    }

    pub fn dimension(mut self, path: impl Into<String>, spec: DimensionSpec) -> Self {
        self.dimensions.insert(path.into(), spec);
        self
    }

    pub fn variable(mut self, path: impl Into<String>, spec: VariableSpec) -> Self {
        self.variables.insert(path.into(), spec);
        self
    }
}

/// One field of a compound type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Primitive type code of the field.
    pub dtype: String,
    pub units: Option<String>,
    pub long_name: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            units: None,
            long_name: None,
        }
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    /// Build a field from its positional form: `[dtype]`,
    /// `[dtype, long_name]` or `[dtype, units, long_name]`.
    pub fn from_positional(name: impl Into<String>, parts: &[String]) -> Option<Self> {
        let field = match parts {
            [dtype] => FieldSpec::new(name, dtype.as_str()),
            [dtype, long_name] => FieldSpec::new(name, dtype.as_str()).long_name(long_name.as_str()),
            [dtype, units, long_name] => FieldSpec::new(name, dtype.as_str())
                .units(units.as_str())
                .long_name(long_name.as_str()),
            _ => return None,
        };
        Some(field)
    }
}

/// A named structured record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSpec {
    /// Fields in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl CompoundSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}

/// Explicit storage layout request (`_chunks`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSpec {
    /// `"contiguous"`.
    Contiguous,
    /// An explicit chunk shape.
    Shape(Vec<u64>),
}

/// Requested fill value (`_FillValue`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillSpec {
    /// The literal string `"NaN"`.
    NaN,
    Number(Number),
}

/// Control fields of a dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionControl {
    /// Extent; `0` is unlimited.
    pub size: u64,
    /// Element type of the coordinate variable. Absent means the dimension is
    /// a bare named axis.
    pub dtype: Option<String>,
    /// Explicit coordinate values.
    pub values: Option<AttrValue>,
    /// `arange`-style `[stop]`, `[start, stop]` or `[start, stop, step]`.
    pub range: Option<Vec<Number>>,
    pub chunks: Option<ChunkSpec>,
    pub fill_value: Option<FillSpec>,
}

/// A named axis, optionally backed by a coordinate variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionSpec {
    pub control: DimensionControl,
    pub attributes: Attributes,
}

impl DimensionSpec {
    pub fn new(size: u64) -> Self {
        Self {
            control: DimensionControl {
                size,
                ..Default::default()
            },
            attributes: Attributes::new(),
        }
    }

    pub fn dtype(mut self, code: impl Into<String>) -> Self {
        self.control.dtype = Some(code.into());
        self
    }

    pub fn values(mut self, values: AttrValue) -> Self {
        self.control.values = Some(values);
        self
    }

    pub fn range(mut self, range: Vec<Number>) -> Self {
        self.control.range = Some(range);
        self
    }

    pub fn chunks(mut self, chunks: ChunkSpec) -> Self {
        self.control.chunks = Some(chunks);
        self
    }

    pub fn fill_value(mut self, fill: FillSpec) -> Self {
        self.control.fill_value = Some(fill);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Dimension references of a variable (`_dims`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dims {
    /// The sentinel `["scalar"]`: a zero-dimensional variable.
    Scalar,
    /// Ordered dimension paths.
    Axes(Vec<String>),
}

impl Dims {
    pub fn axes<S: AsRef<str>>(names: &[S]) -> Self {
        Dims::Axes(names.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

/// Control fields of a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableControl {
    /// Primitive type code or compound type name.
    pub dtype: String,
    pub dims: Dims,
    pub fill_value: Option<FillSpec>,
    pub chunks: Option<ChunkSpec>,
    /// Deflate level; implies byte shuffling.
    pub compression: Option<u32>,
    pub vlen: bool,
}

/// A variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub control: VariableControl,
    pub attributes: Attributes,
}

impl VariableSpec {
    pub fn new(dtype: impl Into<String>, dims: Dims) -> Self {
        Self {
            control: VariableControl {
                dtype: dtype.into(),
                dims,
                fill_value: None,
                chunks: None,
                compression: None,
                vlen: false,
            },
            attributes: Attributes::new(),
        }
    }

    pub fn fill_value(mut self, fill: FillSpec) -> Self {
        self.control.fill_value = Some(fill);
        self
    }

    pub fn chunks(mut self, chunks: ChunkSpec) -> Self {
        self.control.chunks = Some(chunks);
        self
    }

    pub fn compression(mut self, level: u32) -> Self {
        self.control.compression = Some(level);
        self
    }

    pub fn vlen(mut self) -> Self {
        self.control.vlen = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
