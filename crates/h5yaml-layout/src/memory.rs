//! In-memory storage engine.
//!
//! [`MemoryContainer`] keeps the whole container model (groups, dimensions,
//! named types, variables, attributes and any written data) in memory. It is
//! the handle returned by the diskless variant and the source every persisted
//! writer serializes from.

use std::collections::HashMap;

use crate::engine::{
    CompoundField, DimId, ElementType, NodeId, StorageEngine, TypeId, VariableProps,
};
use crate::error::EngineError;
use crate::path;
use crate::schema::Attributes;
use crate::value::{ArrayData, AttrValue};

/// A group or variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Normalized path; the root is `""`.
    pub path: String,
    pub kind: NodeKind,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Variable(Variable),
}

/// A variable and its storage state.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub props: VariableProps,
    /// Written data, if any.
    pub data: Option<ArrayData>,
    /// Dimension attached to each axis.
    pub dims: Vec<Option<DimId>>,
    /// The dimension this variable is the coordinate of.
    pub scale_of: Option<DimId>,
}

/// A named axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub path: String,
    /// Extent; `0` is unlimited.
    pub size: u64,
    pub scale: Option<Scale>,
}

impl Dimension {
    pub fn is_unlimited(&self) -> bool {
        self.size == 0
    }
}

/// Link from a dimension to its coordinate variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    pub variable: NodeId,
    /// Dimension-scale name stored with the coordinate variable.
    pub name: String,
}

/// A registered (committed) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedType {
    Compound {
        name: String,
        fields: Vec<CompoundField>,
        size: usize,
    },
    Vlen {
        name: String,
        base: ElementType,
    },
}

impl NamedType {
    pub fn name(&self) -> &str {
        match self {
            NamedType::Compound { name, .. } | NamedType::Vlen { name, .. } => name,
        }
    }
}

/// Container held entirely in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryContainer {
    nodes: Vec<Node>,
    paths: HashMap<String, NodeId>,
    dimensions: Vec<Dimension>,
    dim_paths: HashMap<String, DimId>,
    types: Vec<NamedType>,
    type_names: HashMap<String, TypeId>,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContainer {
    /// An empty container holding only the root group.
    pub fn new() -> Self {
        let root = Node {
            path: String::new(),
            kind: NodeKind::Group,
            attributes: Attributes::new(),
        };
        let mut paths = HashMap::new();
        paths.insert(String::new(), NodeId(0));
        Self {
            nodes: vec![root],
            paths,
            dimensions: Vec::new(),
            dim_paths: HashMap::new(),
            types: Vec::new(),
            type_names: HashMap::new(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        self.paths.get(path).and_then(|&id| self.get(id))
    }

    pub fn is_group(&self, path: &str) -> bool {
        matches!(self.node(path), Some(Node { kind: NodeKind::Group, .. }))
    }

    pub fn variable(&self, path: &str) -> Option<&Variable> {
        match self.node(path) {
            Some(Node {
                kind: NodeKind::Variable(var),
                ..
            }) => Some(var),
            _ => None,
        }
    }

    pub fn attributes(&self, path: &str) -> Option<&Attributes> {
        self.node(path).map(|n| &n.attributes)
    }

    pub fn attribute(&self, path: &str, name: &str) -> Option<&AttrValue> {
        self.attributes(path).and_then(|attrs| attrs.get(name))
    }

    pub fn dimension(&self, path: &str) -> Option<&Dimension> {
        self.dim_paths
            .get(path)
            .and_then(|&id| self.dimensions.get(id.0))
    }

    pub fn dimension_by_id(&self, id: DimId) -> Option<&Dimension> {
        self.dimensions.get(id.0)
    }

    pub fn named_type(&self, name: &str) -> Option<&NamedType> {
        self.type_names.get(name).and_then(|&id| self.types.get(id.0))
    }

    pub fn type_by_id(&self, id: TypeId) -> Option<&NamedType> {
        self.types.get(id.0)
    }

    /// Groups and variables in creation order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Dimensions in creation order.
    pub fn dimensions(&self) -> impl Iterator<Item = (DimId, &Dimension)> {
        self.dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (DimId(i), d))
    }

    /// Named types in registration order.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &NamedType)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i), t))
    }

    fn require_parent_group(&self, path: &str) -> Result<(), EngineError> {
        let parent = path::parent(path).unwrap_or("");
        match self.node(parent) {
            Some(Node {
                kind: NodeKind::Group,
                ..
            }) => Ok(()),
            Some(_) => Err(EngineError::Conflict(parent.to_string())),
            None => Err(EngineError::NotFound(parent.to_string())),
        }
    }

    fn variable_mut(&mut self, id: NodeId) -> Result<&mut Variable, EngineError> {
        match self.nodes.get_mut(id.0) {
            Some(Node {
                kind: NodeKind::Variable(var),
                ..
            }) => Ok(var),
            Some(node) => Err(EngineError::Conflict(node.path.clone())),
            None => Err(EngineError::NotFound(format!("node #{}", id.0))),
        }
    }

    fn check_element(&self, element: &ElementType) -> Result<(), EngineError> {
        match element {
            ElementType::Primitive(_) => Ok(()),
            ElementType::Compound { id, name, .. } | ElementType::Vlen { id, name, .. } => {
                match self.types.get(id.0) {
                    Some(t) if t.name() == name => Ok(()),
                    _ => Err(EngineError::NotFound(name.clone())),
                }
            }
        }
    }

    fn check_props(&self, path: &str, props: &VariableProps) -> Result<(), EngineError> {
        self.check_element(&props.element)?;
        let rank = props.rank();
        let mismatch = |what: &str| EngineError::DataMismatch(format!("{path}: {what}"));

        let mut unbounded = false;
        if let Some(maxshape) = &props.maxshape {
            if maxshape.len() != rank {
                return Err(mismatch("maxshape rank differs from shape"));
            }
            for (&cur, max) in props.shape.iter().zip(maxshape) {
                match max {
                    Some(m) if *m < cur => return Err(mismatch("maxshape below shape")),
                    Some(_) => {}
                    None => unbounded = true,
                }
            }
        }
        match &props.chunk_dims {
            Some(chunks) => {
                if chunks.len() != rank || rank == 0 {
                    return Err(mismatch("chunk rank differs from shape"));
                }
                if chunks.contains(&0) {
                    return Err(mismatch("zero chunk extent"));
                }
            }
            None => {
                if unbounded {
                    return Err(mismatch("unbounded maxshape requires chunked storage"));
                }
                if props.deflate_level.is_some() {
                    return Err(mismatch("compression requires chunked storage"));
                }
            }
        }
        if let Some(fill) = &props.fill_value {
            if fill.len() != 1 {
                return Err(mismatch("fill value must hold one element"));
            }
        }
        Ok(())
    }
}

fn data_matches(element: &ElementType, data: &ArrayData) -> bool {
    match (element, data) {
        (ElementType::Primitive(dt), ArrayData::Numeric(arr)) => arr.dtype() == *dt,
        (ElementType::Primitive(dt), ArrayData::Strings(_)) => dt.is_string(),
        _ => false,
    }
}

impl StorageEngine for MemoryContainer {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn lookup(&self, path: &str) -> Option<NodeId> {
        self.paths.get(path).copied()
    }

    fn lookup_dimension(&self, path: &str) -> Option<DimId> {
        self.dim_paths.get(path).copied()
    }

    fn create_group(&mut self, path: &str) -> Result<NodeId, EngineError> {
        if let Some(node) = self.node(path) {
            return match node.kind {
                NodeKind::Group => Ok(self.paths[path]),
                NodeKind::Variable(_) => Err(EngineError::Conflict(path.to_string())),
            };
        }
        if self.dim_paths.contains_key(path) {
            return Err(EngineError::Conflict(path.to_string()));
        }
        self.require_parent_group(path)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            path: path.to_string(),
            kind: NodeKind::Group,
            attributes: Attributes::new(),
        });
        self.paths.insert(path.to_string(), id);
        Ok(id)
    }

    fn create_dimension(&mut self, path: &str, size: u64) -> Result<DimId, EngineError> {
        if path.is_empty() || self.is_group(path) {
            return Err(EngineError::Conflict(path.to_string()));
        }
        if self.dim_paths.contains_key(path) {
            return Err(EngineError::AlreadyExists(path.to_string()));
        }
        self.require_parent_group(path)?;
        let id = DimId(self.dimensions.len());
        self.dimensions.push(Dimension {
            path: path.to_string(),
            size,
            scale: None,
        });
        self.dim_paths.insert(path.to_string(), id);
        Ok(id)
    }

    fn create_compound_type(
        &mut self,
        name: &str,
        fields: &[CompoundField],
    ) -> Result<TypeId, EngineError> {
        if self.type_names.contains_key(name) {
            return Err(EngineError::AlreadyExists(name.to_string()));
        }
        if fields.is_empty() {
            return Err(EngineError::DataMismatch(format!("{name}: no fields")));
        }
        let size = fields
            .iter()
            .map(|f| f.offset + f.dtype.size())
            .max()
            .unwrap_or(0);
        let id = TypeId(self.types.len());
        self.types.push(NamedType::Compound {
            name: name.to_string(),
            fields: fields.to_vec(),
            size,
        });
        self.type_names.insert(name.to_string(), id);
        Ok(id)
    }

    fn create_vlen_type(&mut self, name: &str, base: &ElementType) -> Result<TypeId, EngineError> {
        if self.type_names.contains_key(name) {
            return Err(EngineError::AlreadyExists(name.to_string()));
        }
        self.check_element(base)?;
        let id = TypeId(self.types.len());
        self.types.push(NamedType::Vlen {
            name: name.to_string(),
            base: base.clone(),
        });
        self.type_names.insert(name.to_string(), id);
        Ok(id)
    }

    fn create_variable(
        &mut self,
        path: &str,
        props: &VariableProps,
    ) -> Result<NodeId, EngineError> {
        if path.is_empty() || self.dim_paths.contains_key(path) {
            return Err(EngineError::Conflict(path.to_string()));
        }
        if self.paths.contains_key(path) {
            return Err(EngineError::AlreadyExists(path.to_string()));
        }
        self.require_parent_group(path)?;
        self.check_props(path, props)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            path: path.to_string(),
            kind: NodeKind::Variable(Variable {
                props: props.clone(),
                data: None,
                dims: vec![None; props.rank()],
                scale_of: None,
            }),
            attributes: Attributes::new(),
        });
        self.paths.insert(path.to_string(), id);
        Ok(id)
    }

    fn write_data(&mut self, var: NodeId, data: &ArrayData) -> Result<(), EngineError> {
        let variable = self.variable_mut(var)?;
        let expected = variable.props.num_elements();
        if data.len() as u64 != expected {
            return Err(EngineError::DataMismatch(format!(
                "expected {expected} elements, got {}",
                data.len()
            )));
        }
        if !data_matches(&variable.props.element, data) {
            return Err(EngineError::DataMismatch(
                "data type differs from the variable element type".to_string(),
            ));
        }
        variable.data = Some(data.clone());
        Ok(())
    }

    fn make_scale(&mut self, var: NodeId, dim: DimId, name: &str) -> Result<(), EngineError> {
        let size = match self.dimensions.get(dim.0) {
            Some(d) if d.scale.is_some() => return Err(EngineError::AlreadyExists(d.path.clone())),
            Some(d) => d.size,
            None => return Err(EngineError::NotFound(format!("dimension #{}", dim.0))),
        };
        let variable = self.variable_mut(var)?;
        if variable.props.shape != [size] {
            return Err(EngineError::DataMismatch(
                "a dimension scale must be one-dimensional and match the dimension size"
                    .to_string(),
            ));
        }
        variable.scale_of = Some(dim);
        variable.dims[0] = Some(dim);
        if let Some(d) = self.dimensions.get_mut(dim.0) {
            d.scale = Some(Scale {
                variable: var,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn attach_scale(&mut self, var: NodeId, axis: usize, dim: DimId) -> Result<(), EngineError> {
        let (dim_path, size) = match self.dimensions.get(dim.0) {
            Some(d) => (d.path.clone(), d.size),
            None => return Err(EngineError::NotFound(format!("dimension #{}", dim.0))),
        };
        let variable = self.variable_mut(var)?;
        match variable.props.shape.get(axis) {
            Some(&extent) if extent == size => {
                variable.dims[axis] = Some(dim);
                Ok(())
            }
            Some(&extent) => Err(EngineError::DataMismatch(format!(
                "axis {axis} has extent {extent}, dimension {dim_path} has size {size}"
            ))),
            None => Err(EngineError::DataMismatch(format!(
                "axis {axis} out of range for dimension {dim_path}"
            ))),
        }
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), EngineError> {
        match self.nodes.get_mut(node.0) {
            Some(n) => {
                n.attributes.insert(name.to_string(), value.clone());
                Ok(())
            }
            None => Err(EngineError::NotFound(format!("node #{}", node.0))),
        }
    }

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get(node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Dtype;
    use crate::value::NumericArray;

    fn f4() -> ElementType {
        ElementType::Primitive(Dtype::F32)
    }

    #[test]
    fn groups_are_idempotent() {
        let mut c = MemoryContainer::new();
        let a = c.create_group("a").unwrap();
        assert_eq!(c.create_group("a").unwrap(), a);
        c.create_group("a/b").unwrap();
        assert!(c.is_group("a/b"));
        assert!(matches!(c.create_group("x/y"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn variables_need_free_paths() {
        let mut c = MemoryContainer::new();
        let props = VariableProps::new(f4(), &[3]);
        c.create_variable("v", &props).unwrap();
        assert!(matches!(
            c.create_variable("v", &props),
            Err(EngineError::AlreadyExists(_))
        ));
        assert!(matches!(c.create_group("v"), Err(EngineError::Conflict(_))));
        assert!(matches!(
            c.create_variable("v/w", &props),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn unbounded_requires_chunks() {
        let mut c = MemoryContainer::new();
        let props = VariableProps::new(f4(), &[0]).maxshape(&[None]);
        assert!(matches!(
            c.create_variable("t", &props),
            Err(EngineError::DataMismatch(_))
        ));
        let props = props.chunk(&[1024]);
        assert!(c.create_variable("t", &props).is_ok());
    }

    #[test]
    fn write_checks_length_and_type() {
        let mut c = MemoryContainer::new();
        let id = c
            .create_variable("x", &VariableProps::new(f4(), &[3]))
            .unwrap();
        let short = ArrayData::Numeric(NumericArray::F32(vec![1.0]));
        assert!(c.write_data(id, &short).is_err());
        let wrong = ArrayData::Numeric(NumericArray::F64(vec![1.0, 2.0, 3.0]));
        assert!(c.write_data(id, &wrong).is_err());
        let good = ArrayData::Numeric(NumericArray::F32(vec![1.0, 2.0, 3.0]));
        c.write_data(id, &good).unwrap();
        assert_eq!(c.variable("x").unwrap().data, Some(good));
    }

    #[test]
    fn scales_and_attachment() {
        let mut c = MemoryContainer::new();
        let x = c
            .create_variable("x", &VariableProps::new(f4(), &[4]))
            .unwrap();
        let dim = c.create_dimension("x", 4).unwrap();
        c.make_scale(x, dim, "x").unwrap();
        assert_eq!(c.dimension("x").unwrap().scale.as_ref().unwrap().variable, x);
        assert!(c.make_scale(x, dim, "x").is_err());

        let v = c
            .create_variable("v", &VariableProps::new(f4(), &[2, 4]))
            .unwrap();
        c.attach_scale(v, 1, dim).unwrap();
        assert!(c.attach_scale(v, 0, dim).is_err());
        assert!(c.attach_scale(v, 2, dim).is_err());
        assert_eq!(c.variable("v").unwrap().dims, vec![None, Some(dim)]);
    }

    #[test]
    fn dimension_conflicts() {
        let mut c = MemoryContainer::new();
        c.create_dimension("time", 0).unwrap();
        assert!(matches!(
            c.create_dimension("time", 0),
            Err(EngineError::AlreadyExists(_))
        ));
        assert!(matches!(
            c.create_variable("time", &VariableProps::new(f4(), &[1])),
            Err(EngineError::Conflict(_))
        ));
        assert!(c.create_dimension("nogroup/x", 3).is_err());
    }

    #[test]
    fn compound_and_vlen_types() {
        let mut c = MemoryContainer::new();
        let fields = CompoundField::pack(&[("lat".into(), Dtype::F32), ("flag".into(), Dtype::U8)]);
        assert_eq!(fields[1].offset, 4);
        let id = c.create_compound_type("geo_t", &fields).unwrap();
        match c.named_type("geo_t").unwrap() {
            NamedType::Compound { size, .. } => assert_eq!(*size, 5),
            other => panic!("unexpected type {other:?}"),
        }
        assert!(c.create_compound_type("geo_t", &fields).is_err());

        let base = ElementType::Primitive(Dtype::U16);
        let vid = c.create_vlen_type("u2_vlen", &base).unwrap();
        assert_ne!(id, vid);
        let bogus = ElementType::Compound {
            id: TypeId(9),
            name: "nope".into(),
            size: 1,
        };
        assert!(c.create_vlen_type("nope_vlen", &bogus).is_err());
    }

    #[test]
    fn attributes() {
        let mut c = MemoryContainer::new();
        let root = c.root();
        assert!(!c.has_attribute(root, "title"));
        c.set_attribute(root, "title", &AttrValue::from("demo")).unwrap();
        assert!(c.has_attribute(root, "title"));
        assert_eq!(c.attribute("", "title"), Some(&AttrValue::from("demo")));
    }
}
