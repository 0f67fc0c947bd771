//! Error types for schema loading and container creation.

use std::fmt;
use std::path::PathBuf;

use h5yaml_layout::{EngineError, ValidationError};

/// Errors returned by [`H5Yaml`](crate::H5Yaml).
#[derive(Debug)]
pub enum Error {
    /// A schema document does not exist.
    NotFound(PathBuf),
    /// A schema document is not valid YAML.
    Parse { path: PathBuf, message: String },
    /// The merged definition violates a structural invariant.
    Validation(ValidationError),
    /// The in-memory container rejected an operation.
    Engine(EngineError),
    /// The destination container could not be written.
    Creation { path: PathBuf, source: EngineError },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(path) => write!(f, "{} not found", path.display()),
            Error::Parse { path, message } => {
                write!(f, "Failed to parse {}: {message}", path.display())
            }
            Error::Validation(e) => write!(f, "invalid schema: {e}"),
            Error::Engine(e) => write!(f, "container error: {e}"),
            Error::Creation { path, .. } => write!(f, "failed to create {}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(e) => Some(e),
            Error::Engine(e) => Some(e),
            Error::Creation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<h5yaml_layout::Error> for Error {
    fn from(e: h5yaml_layout::Error) -> Self {
        match e {
            h5yaml_layout::Error::Validation(e) => Error::Validation(e),
            h5yaml_layout::Error::Engine(e) => Error::Engine(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn creation_hides_engine_text() {
        let err = Error::Creation {
            path: PathBuf::from("/no/such/dir/out.h5"),
            source: EngineError::Io(io::Error::new(io::ErrorKind::NotFound, "os error 2")),
        };
        assert_eq!(err.to_string(), "failed to create /no/such/dir/out.h5");
        assert!(err.source().is_some());
    }

    #[test]
    fn messages() {
        let err = Error::NotFound(PathBuf::from("schema.yaml"));
        assert_eq!(err.to_string(), "schema.yaml not found");
        let err = Error::Parse {
            path: PathBuf::from("bad.yaml"),
            message: "unexpected end".into(),
        };
        assert!(err.to_string().starts_with("Failed to parse bad.yaml"));
    }

    #[test]
    fn layout_errors_convert() {
        let err: Error = h5yaml_layout::Error::Validation(ValidationError::ContiguousUnlimited {
            variable: "v".into(),
        })
        .into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
