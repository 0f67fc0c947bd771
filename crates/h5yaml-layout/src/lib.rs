//! Schema-to-layout compiler for HDF5/netCDF-4 style containers.
//!
//! A [`SchemaDefinition`] declares groups, dimensions, compound types and
//! variables. [`compile`] resolves it into a physical layout (shapes, maximum
//! shapes, chunking, compression, fill values, dimension scales, coerced
//! attributes) and issues the matching creation calls against any
//! [`StorageEngine`]. [`MemoryContainer`] is the bundled in-memory engine.
//!
//! # Example
//!
//! ```
//! use h5yaml_layout::{
//!     compile, DimensionSpec, Dims, LayoutConfig, MemoryContainer, Number, SchemaDefinition,
//!     VariableSpec,
//! };
//!
//! let def = SchemaDefinition::new()
//!     .dimension("time", DimensionSpec::new(0))
//!     .dimension(
//!         "x",
//!         DimensionSpec::new(100)
//!             .dtype("f4")
//!             .range(vec![Number::Int(0), Number::Int(100), Number::Int(1)]),
//!     )
//!     .variable("temp", VariableSpec::new("f4", Dims::axes(&["time", "x"])));
//!
//! let mut container = MemoryContainer::new();
//! compile(&def, &mut container, &LayoutConfig::default()).unwrap();
//!
//! let temp = container.variable("temp").unwrap();
//! assert_eq!(temp.props.shape, vec![0, 100]);
//! assert_eq!(temp.props.chunk_dims, Some(vec![1024, 100]));
//! ```

pub mod chunks;
pub mod coerce;
pub mod compiler;
pub mod config;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod memory;
pub mod path;
pub mod registry;
pub mod schema;
pub mod value;

pub use chunks::{advise, ChunkAdvice, ChunkPolicy};
pub use coerce::{coerce, coerce_with, FlagWidth};
pub use compiler::{compile, compile_with, NETCDF_DIMENSION_MARKER};
pub use config::LayoutConfig;
pub use dtype::Dtype;
pub use engine::{
    CompoundField, DimId, ElementType, NodeId, StorageEngine, TypeId, VariableProps,
};
pub use error::{EngineError, Error, ValidationError};
pub use memory::{Dimension, MemoryContainer, NamedType, Node, NodeKind, Variable};
pub use registry::Registries;
pub use schema::{
    Attributes, ChunkSpec, CompoundSpec, DimensionSpec, Dims, FieldSpec, FillSpec,
    SchemaDefinition, VariableSpec,
};
pub use value::{ArrayData, AttrValue, CastError, Number, NumericArray};
