//! Schema loader and merger.
//!
//! Several schema documents merge into one [`SchemaDefinition`]: group lists
//! are unioned, every mapping section is overwritten key by key in document
//! order. A `compounds` section given as a list of file names is resolved
//! relative to the directory of the first document once all documents are
//! merged.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use h5yaml_layout::SchemaDefinition;

use crate::convert;
use crate::document;
use crate::error::Error;

/// A recoverable problem found while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A compound include file listed in a schema does not exist.
    MissingInclude { path: PathBuf },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingInclude { path } => {
                write!(f, "compound include {} not found, skipped", path.display())
            }
        }
    }
}

/// Result of [`load`].
#[derive(Debug, Default)]
pub struct Loaded {
    pub definition: SchemaDefinition,
    pub diagnostics: Vec<Diagnostic>,
}

/// Load and merge schema documents.
pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Loaded, Error> {
    let mut loaded = Loaded::default();
    let mut includes = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let doc = document::read(path)?;
        let converted = match doc.as_mapping() {
            Some(map) => convert::document(map)?,
            None => convert::Converted::default(),
        };
        debug!(
            "{}: {} dimensions, {} variables",
            path.display(),
            converted.definition.dimensions.len(),
            converted.definition.variables.len()
        );
        loaded.definition.merge(converted.definition);
        includes.extend(converted.includes);
    }

    if includes.is_empty() {
        return Ok(loaded);
    }
    let base = paths
        .first()
        .and_then(|p| p.as_ref().parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    for name in includes {
        let path = base.join(&name);
        if !path.is_file() {
            let diagnostic = Diagnostic::MissingInclude { path };
            warn!("{diagnostic}");
            loaded.diagnostics.push(diagnostic);
            continue;
        }
        let doc = document::read(&path)?;
        if let Some(map) = doc.as_mapping() {
            let compounds = convert::compounds(map)?;
            debug!("{}: {} compound types", path.display(), compounds.len());
            loaded.definition.compounds.extend(compounds);
        }
    }
    Ok(loaded)
}
