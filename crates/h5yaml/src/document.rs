//! Reading raw schema documents.

use std::fs;
use std::path::Path;

use serde_yaml::Value;

use crate::error::Error;

/// Read and parse one YAML document.
///
/// An empty document reads as an empty mapping.
pub fn read(path: &Path) -> Result<Value, Error> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()));
    }
    let parse_error = |message: String| Error::Parse {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
    let value: Value = serde_yaml::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
    match value {
        Value::Null => Ok(Value::Mapping(Default::default())),
        Value::Mapping(_) => Ok(value),
        _ => Err(parse_error("top-level value is not a mapping".to_string())),
    }
}
