//! Error types for the layout compiler.

use std::fmt;
use std::io;

/// A resolved definition violates a structural invariant.
///
/// Raised at the point of detection; compilation stops immediately.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// More than one referenced dimension of a variable is unlimited.
    MultipleUnlimited {
        variable: String,
        dimensions: Vec<String>,
    },
    /// Contiguous storage requested for a variable with an unlimited axis.
    ContiguousUnlimited { variable: String },
    /// `_vlen` requested on a compound-typed variable.
    VlenCompound { variable: String, compound: String },
    /// A `_dims` entry does not name a declared dimension.
    UnknownDimension { variable: String, dimension: String },
    /// `_dtype` is neither a primitive code nor a declared compound.
    UnknownDtype { node: String, code: String },
    /// A path-qualified attribute targets a node that does not exist.
    UnknownNode { key: String },
    /// Explicit chunk shape has the wrong number of axes.
    ChunkRank {
        node: String,
        expected: usize,
        found: usize,
    },
    /// Explicit chunk shape has a zero entry or exceeds a fixed extent.
    InvalidChunk { node: String, reason: String },
    /// Coordinate data does not match the dimension size.
    ValueCount {
        node: String,
        expected: u64,
        found: u64,
    },
    /// An attribute literal does not fit the element type it is coerced to.
    AttributeRange {
        node: String,
        attribute: String,
        reason: String,
    },
    /// `_FillValue` cannot be represented in the element type.
    FillValue { node: String, reason: String },
    /// A schema entry is malformed.
    InvalidSpec { node: String, reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MultipleUnlimited {
                variable,
                dimensions,
            } => write!(
                f,
                "{variable}: more than one unlimited dimension ({})",
                dimensions.join(", ")
            ),
            ValidationError::ContiguousUnlimited { variable } => {
                write!(f, "{variable}: contiguous storage with an unlimited dimension")
            }
            ValidationError::VlenCompound { variable, compound } => {
                write!(f, "{variable}: can not have vlen with compound {compound}")
            }
            ValidationError::UnknownDimension {
                variable,
                dimension,
            } => write!(f, "{variable}: unknown dimension {dimension}"),
            ValidationError::UnknownDtype { node, code } => {
                write!(f, "{node}: unknown data type {code}")
            }
            ValidationError::UnknownNode { key } => {
                write!(f, "{key}: attribute target does not exist")
            }
            ValidationError::ChunkRank {
                node,
                expected,
                found,
            } => write!(
                f,
                "{node}: chunk shape has {found} axes, variable has {expected}"
            ),
            ValidationError::InvalidChunk { node, reason } => {
                write!(f, "{node}: invalid chunk shape: {reason}")
            }
            ValidationError::ValueCount {
                node,
                expected,
                found,
            } => write!(f, "{node}: expected {expected} values, got {found}"),
            ValidationError::AttributeRange {
                node,
                attribute,
                reason,
            } => write!(f, "{node}: attribute {attribute}: {reason}"),
            ValidationError::FillValue { node, reason } => {
                write!(f, "{node}: invalid _FillValue: {reason}")
            }
            ValidationError::InvalidSpec { node, reason } => write!(f, "{node}: {reason}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors reported by a storage engine.
#[derive(Debug)]
pub enum EngineError {
    /// A node, dimension or type already exists at the path.
    AlreadyExists(String),
    /// A referenced node, dimension or type does not exist.
    NotFound(String),
    /// The path is occupied by a node of another kind.
    Conflict(String),
    /// Data or attribute payload does not match the target.
    DataMismatch(String),
    /// I/O error from the underlying storage.
    Io(io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AlreadyExists(path) => write!(f, "already exists: {path}"),
            EngineError::NotFound(path) => write!(f, "not found: {path}"),
            EngineError::Conflict(path) => write!(f, "conflicting object at {path}"),
            EngineError::DataMismatch(msg) => write!(f, "data mismatch: {msg}"),
            EngineError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::Io(e)
    }
}

/// Errors returned by [`compile`](crate::compiler::compile).
#[derive(Debug)]
pub enum Error {
    /// The definition is structurally invalid.
    Validation(ValidationError),
    /// The storage engine rejected an operation.
    Engine(EngineError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "validation error: {e}"),
            Error::Engine(e) => write!(f, "storage engine error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(e) => Some(e),
            Error::Engine(e) => Some(e),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Error::Engine(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = ValidationError::MultipleUnlimited {
            variable: "temp".into(),
            dimensions: vec!["time".into(), "scan".into()],
        };
        assert_eq!(
            err.to_string(),
            "temp: more than one unlimited dimension (time, scan)"
        );

        let err = ValidationError::VlenCompound {
            variable: "obs".into(),
            compound: "geo_t".into(),
        };
        assert!(err.to_string().contains("vlen"));
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error as _;

        let err = Error::from(EngineError::from(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "denied",
        )));
        let engine = err.source().unwrap();
        assert!(engine.to_string().contains("I/O error"));
        assert!(engine.source().is_some());
    }
}
