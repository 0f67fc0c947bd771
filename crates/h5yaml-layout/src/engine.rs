//! Storage engine contract.
//!
//! The layout compiler never writes bytes itself. It issues creation calls
//! against a [`StorageEngine`], which owns groups, dimensions, named types,
//! variables and their attributes. Backends decide how (and whether) that
//! model is persisted.
//!
//! ```text
//! ┌──────────────────────────┐
//! │      layout compiler     │
//! ├──────────────────────────┤
//! │      StorageEngine       │  ← trait defined here
//! ├────────────┬─────────────┤
//! │  memory    │  persisted  │  ← backends
//! └────────────┴─────────────┘
//! ```

use crate::dtype::{Dtype, VLEN_DESCRIPTOR_SIZE};
use crate::error::EngineError;
use crate::value::{ArrayData, AttrValue, NumericArray};

/// Handle of a group or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Handle of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimId(pub usize);

/// Handle of a named (committed) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// Element type of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Primitive(Dtype),
    /// A registered compound type.
    Compound {
        id: TypeId,
        name: String,
        size: usize,
    },
    /// A registered variable-length sequence of `base`.
    Vlen {
        id: TypeId,
        name: String,
        base: Box<ElementType>,
    },
}

impl ElementType {
    /// Bytes per element as seen by the chunk advisor.
    pub fn size(&self) -> usize {
        match self {
            ElementType::Primitive(dt) => dt.size(),
            ElementType::Compound { size, .. } => *size,
            ElementType::Vlen { .. } => VLEN_DESCRIPTOR_SIZE,
        }
    }

    /// The primitive type, if this is one.
    pub fn primitive(&self) -> Option<Dtype> {
        match self {
            ElementType::Primitive(dt) => Some(*dt),
            _ => None,
        }
    }

    /// The registered type handle, for compound and vlen types.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            ElementType::Primitive(_) => None,
            ElementType::Compound { id, .. } | ElementType::Vlen { id, .. } => Some(*id),
        }
    }
}

/// One member of a compound type, at a packed byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundField {
    pub name: String,
    pub dtype: Dtype,
    pub offset: usize,
}

impl CompoundField {
    /// Lay out `members` back to back, without padding.
    pub fn pack(members: &[(String, Dtype)]) -> Vec<CompoundField> {
        let mut offset = 0;
        members
            .iter()
            .map(|(name, dtype)| {
                let field = CompoundField {
                    name: name.clone(),
                    dtype: *dtype,
                    offset,
                };
                offset += dtype.size();
                field
            })
            .collect()
    }
}

/// Creation properties of a variable.
///
/// ```
/// use h5yaml_layout::{Dtype, ElementType, VariableProps};
///
/// let props = VariableProps::new(ElementType::Primitive(Dtype::F32), &[0, 100])
///     .maxshape(&[None, Some(100)])
///     .chunk(&[1024, 100])
///     .deflate(4)
///     .shuffle();
/// assert!(props.is_chunked());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VariableProps {
    pub element: ElementType,
    /// Current extents; `0` along an unlimited axis.
    pub shape: Vec<u64>,
    /// Maximum extents, `None` meaning unbounded. Absent means equal to
    /// `shape`.
    pub maxshape: Option<Vec<Option<u64>>>,
    /// Chunk shape. Absent means contiguous storage.
    pub chunk_dims: Option<Vec<u64>>,
    /// Gzip-class deflate level.
    pub deflate_level: Option<u32>,
    /// Byte shuffle before compression.
    pub shuffle: bool,
    /// Single-element fill value. Absent means the engine default.
    pub fill_value: Option<NumericArray>,
}

impl VariableProps {
    pub fn new(element: ElementType, shape: &[u64]) -> Self {
        Self {
            element,
            shape: shape.to_vec(),
            maxshape: None,
            chunk_dims: None,
            deflate_level: None,
            shuffle: false,
            fill_value: None,
        }
    }

    /// Zero-dimensional variable.
    pub fn scalar(element: ElementType) -> Self {
        Self::new(element, &[])
    }

    pub fn maxshape(mut self, dims: &[Option<u64>]) -> Self {
        self.maxshape = Some(dims.to_vec());
        self
    }

    pub fn chunk(mut self, dims: &[u64]) -> Self {
        self.chunk_dims = Some(dims.to_vec());
        self
    }

    pub fn deflate(mut self, level: u32) -> Self {
        self.deflate_level = Some(level);
        self
    }

    pub fn shuffle(mut self) -> Self {
        self.shuffle = true;
        self
    }

    pub fn fill_value(mut self, fill: NumericArray) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn is_chunked(&self) -> bool {
        self.chunk_dims.is_some()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements at the current extents.
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// Creation primitives consumed by the layout compiler.
///
/// Paths are normalized (`"a/b"`, root is `""`). Every method either succeeds
/// completely or leaves the container unchanged.
pub trait StorageEngine {
    /// Handle of the root group.
    fn root(&self) -> NodeId;

    /// Look up a group or variable by path.
    fn lookup(&self, path: &str) -> Option<NodeId>;

    /// Look up a dimension by path.
    fn lookup_dimension(&self, path: &str) -> Option<DimId>;

    /// Create a group. Creating an existing group returns its handle; the
    /// parent group must already exist.
    fn create_group(&mut self, path: &str) -> Result<NodeId, EngineError>;

    /// Create a named axis of `size` elements (`0` is unlimited).
    fn create_dimension(&mut self, path: &str, size: u64) -> Result<DimId, EngineError>;

    /// Register a named compound type.
    fn create_compound_type(
        &mut self,
        name: &str,
        fields: &[CompoundField],
    ) -> Result<TypeId, EngineError>;

    /// Register a named variable-length type wrapping `base`.
    fn create_vlen_type(&mut self, name: &str, base: &ElementType) -> Result<TypeId, EngineError>;

    /// Create a variable. The parent group must exist and the path be free.
    fn create_variable(&mut self, path: &str, props: &VariableProps)
        -> Result<NodeId, EngineError>;

    /// Fill a variable with data covering its current extents.
    fn write_data(&mut self, var: NodeId, data: &ArrayData) -> Result<(), EngineError>;

    /// Make a one-dimensional variable the scale (coordinate) of `dim`.
    fn make_scale(&mut self, var: NodeId, dim: DimId, name: &str) -> Result<(), EngineError>;

    /// Attach `dim` to axis `axis` of `var`.
    fn attach_scale(&mut self, var: NodeId, axis: usize, dim: DimId) -> Result<(), EngineError>;

    /// Create or replace an attribute.
    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), EngineError>;

    fn has_attribute(&self, node: NodeId, name: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        assert_eq!(ElementType::Primitive(Dtype::F64).size(), 8);
        let compound = ElementType::Compound {
            id: TypeId(0),
            name: "geo_t".into(),
            size: 12,
        };
        assert_eq!(compound.size(), 12);
        assert_eq!(compound.type_id(), Some(TypeId(0)));
        let vlen = ElementType::Vlen {
            id: TypeId(1),
            name: "u2_vlen".into(),
            base: Box::new(ElementType::Primitive(Dtype::U16)),
        };
        assert_eq!(vlen.size(), VLEN_DESCRIPTOR_SIZE);
        assert_eq!(vlen.primitive(), None);
    }

    #[test]
    fn props_builder() {
        let props = VariableProps::new(ElementType::Primitive(Dtype::U8), &[3, 4]);
        assert!(!props.is_chunked());
        assert_eq!(props.rank(), 2);
        assert_eq!(props.num_elements(), 12);

        let scalar = VariableProps::scalar(ElementType::Primitive(Dtype::I32));
        assert_eq!(scalar.rank(), 0);
        assert_eq!(scalar.num_elements(), 1);
    }
}
