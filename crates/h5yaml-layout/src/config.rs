//! Compiler configuration.

use crate::chunks::ChunkPolicy;
use crate::coerce::FlagWidth;

/// Default placeholder marking an attribute value still "to be written".
pub const DEFAULT_PLACEHOLDER: &str = "TBW";

/// Settings threaded through [`compile`](crate::compiler::compile).
///
/// ```
/// use h5yaml_layout::{ChunkPolicy, FlagWidth, LayoutConfig};
///
/// let config = LayoutConfig::new()
///     .chunks(ChunkPolicy::new().contiguous_threshold(400_000))
///     .flag_width(FlagWidth::UnsignedByte);
/// assert_eq!(config.placeholder, "TBW");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Chunk heuristic constants.
    pub chunks: ChunkPolicy,
    /// Element type used for flag tables.
    pub flag_width: FlagWidth,
    /// Attribute values equal to this string are never written.
    pub placeholder: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            chunks: ChunkPolicy::default(),
            flag_width: FlagWidth::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl LayoutConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the chunk policy.
    pub fn chunks(mut self, policy: ChunkPolicy) -> Self {
        self.chunks = policy;
        self
    }

    /// Set the flag table width policy.
    pub fn flag_width(mut self, width: FlagWidth) -> Self {
        self.flag_width = width;
        self
    }

    /// Set the placeholder sentinel.
    pub fn placeholder(mut self, sentinel: impl Into<String>) -> Self {
        self.placeholder = sentinel.into();
        self
    }
}
