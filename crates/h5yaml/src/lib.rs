//! Create HDF5/netCDF-4 style containers from YAML schemas.
//!
//! One or more YAML documents declare groups, dimensions, compound types,
//! variables and attributes. [`H5Yaml`] loads and merges them, compiles the
//! result with [`h5yaml_layout`] and either writes an HDF5/JSON container to
//! disk or returns it as an in-memory (diskless) container.
//!
//! # Example
//!
//! ```no_run
//! use h5yaml::H5Yaml;
//!
//! let schema = H5Yaml::new("schema.yaml").unwrap();
//! for diagnostic in schema.diagnostics() {
//!     eprintln!("{diagnostic}");
//! }
//! schema.create("output.h5.json").unwrap();
//! ```

pub mod convert;
pub mod document;
pub mod error;
pub mod h5json;
pub mod loader;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info};

use h5yaml_layout::{
    compile, EngineError, LayoutConfig, MemoryContainer, Registries, SchemaDefinition,
    StorageEngine,
};

pub use error::Error;
pub use loader::{Diagnostic, Loaded};

/// A merged schema ready to be turned into containers.
#[derive(Debug, Clone)]
pub struct H5Yaml {
    definition: SchemaDefinition,
    diagnostics: Vec<Diagnostic>,
    config: LayoutConfig,
}

impl H5Yaml {
    /// Load a single schema document.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_paths(&[path])
    }

    /// Load and merge schema documents, later documents overriding earlier
    /// ones key by key.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let Loaded {
            definition,
            diagnostics,
        } = loader::load(paths)?;
        Ok(Self {
            definition,
            diagnostics,
            config: LayoutConfig::default(),
        })
    }

    /// Wrap an already built definition.
    pub fn from_definition(definition: SchemaDefinition) -> Self {
        Self {
            definition,
            diagnostics: Vec::new(),
            config: LayoutConfig::default(),
        }
    }

    /// Replace the layout configuration.
    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn definition(&self) -> &SchemaDefinition {
        &self.definition
    }

    /// Recoverable problems found while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Compile the schema into any storage engine.
    pub fn compile_into<E: StorageEngine>(&self, engine: &mut E) -> Result<Registries, Error> {
        Ok(compile(&self.definition, engine, &self.config)?)
    }

    /// Build the container in memory only.
    pub fn diskless(&self) -> Result<MemoryContainer, Error> {
        let mut container = MemoryContainer::new();
        self.compile_into(&mut container)?;
        Ok(container)
    }

    /// Create the container at `path` as HDF5/JSON.
    ///
    /// The schema is compiled before the destination is touched, so an
    /// invalid schema leaves an existing file as it was. An existing file is
    /// otherwise truncated, and a partially written file is removed.
    pub fn create<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let creation = |source: EngineError| Error::Creation {
            path: path.to_path_buf(),
            source,
        };
        let container = self.diskless()?;
        let file = File::create(path).map_err(|e| creation(e.into()))?;

        let mut out = BufWriter::new(file);
        let written = h5json::write(&container, &mut out)
            .and_then(|()| out.flush().map_err(EngineError::from));
        if let Err(e) = written {
            discard(path);
            return Err(creation(e));
        }
        info!("created {}", path.display());
        Ok(())
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("could not remove {}: {e}", path.display());
    }
}
