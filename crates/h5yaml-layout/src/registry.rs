//! Caller-owned registries threaded through the compiler.
//!
//! The compiler records every dimension, named type and variable it creates
//! here instead of querying the storage engine's namespace. The registries
//! survive compilation, so callers can inspect what was created or compile
//! several definitions into the same container.

use indexmap::IndexMap;

use crate::dtype::Dtype;
use crate::engine::{DimId, ElementType, NodeId};
use crate::path;

/// A created dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionEntry {
    pub id: DimId,
    /// Extent; `0` is unlimited.
    pub size: u64,
}

/// Dimensions by normalized path.
#[derive(Debug, Clone, Default)]
pub struct DimensionRegistry {
    entries: IndexMap<String, DimensionEntry>,
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: DimensionEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&DimensionEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a dimension reference made from group `scope`.
    ///
    /// An absolute reference (`/grp/dim`) must match exactly. A relative one
    /// is looked up in `scope`, then in each enclosing group out to the root.
    /// Returns the matched normalized path with its entry.
    pub fn resolve(&self, scope: &str, reference: &str) -> Option<(&str, &DimensionEntry)> {
        let target = path::normalize(reference);
        if path::is_absolute(reference) {
            return self.entries.get_key_value(target.as_str()).map(|(k, v)| (k.as_str(), v));
        }

        let mut scopes: Vec<&str> = Vec::new();
        if !scope.is_empty() {
            scopes.push(scope);
            scopes.extend(path::ancestors(scope).into_iter().rev());
        }
        scopes.push("");

        scopes.into_iter().find_map(|group| {
            let candidate = path::join(group, &target);
            self.entries
                .get_key_value(candidate.as_str())
                .map(|(k, v)| (k.as_str(), v))
        })
    }
}

/// A registered compound type and the metadata propagated to its variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundEntry {
    pub element: ElementType,
    /// Units of the fields that declared one, in field order.
    pub units: Vec<String>,
    /// Long names of the fields that declared one, in field order.
    pub long_names: Vec<String>,
}

/// Compound and variable-length types by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    compounds: IndexMap<String, CompoundEntry>,
    vlens: IndexMap<String, ElementType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_compound(&mut self, name: impl Into<String>, entry: CompoundEntry) {
        self.compounds.insert(name.into(), entry);
    }

    pub fn compound(&self, name: &str) -> Option<&CompoundEntry> {
        self.compounds.get(name)
    }

    pub fn insert_vlen(&mut self, name: impl Into<String>, element: ElementType) {
        self.vlens.insert(name.into(), element);
    }

    pub fn vlen(&self, name: &str) -> Option<&ElementType> {
        self.vlens.get(name)
    }

    pub fn compounds(&self) -> impl Iterator<Item = (&str, &CompoundEntry)> {
        self.compounds.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A created variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableEntry {
    pub id: NodeId,
    /// Primitive element type, used to coerce attributes written later.
    pub dtype: Option<Dtype>,
}

/// Variables (including coordinate variables) by normalized path.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    entries: IndexMap<String, VariableEntry>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: VariableEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&VariableEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All registries used by one compilation.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub dimensions: DimensionRegistry,
    pub types: TypeRegistry,
    pub variables: VariableRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }
}
