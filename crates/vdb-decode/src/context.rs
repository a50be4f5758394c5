//! File-scoped decode state shared by the grids of one file.

use crate::compression::{Codecs, CompressionFlags};
use crate::precision::Precision;

/// First file version storing an instance parent name per grid and writing the
/// transform before the tree topology.
pub const GRID_INSTANCING: u32 = 216;
/// First file version whose transforms can be decoded; also the version below
/// which the `name` metadata entry is replaced by the grid name.
pub const NEW_TRANSFORM: u32 = 219;
/// First file version with per-grid compression flags and per-block value
/// encoding ids.
pub const NODE_MASK_COMPRESSION: u32 = 222;

/// Caller-facing decode settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Turn every recoverable warning into an error.
    pub strict: bool,
}

/// Version and mutable state threaded through grid decodes of one file.
///
/// `compression`, `use_half` and `value_type` are rewritten by every grid
/// decode; `compression` is only replaced when the file version stores
/// per-grid flags, otherwise the file-level value is inherited.
#[derive(Debug, Clone)]
pub struct VersionContext {
    pub version: u32,
    pub compression: CompressionFlags,
    pub use_half: bool,
    pub value_type: Precision,
    /// Payload of the last `file_delayed_load` metadata entry seen.
    pub delayed_load: Option<String>,
    pub options: DecodeOptions,
    pub codecs: Codecs,
}

impl VersionContext {
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            compression: CompressionFlags::default(),
            use_half: false,
            value_type: Precision::default(),
            delayed_load: None,
            options: DecodeOptions::default(),
            codecs: Codecs::default(),
        }
    }

    #[must_use]
    pub fn with_compression(mut self, compression: CompressionFlags) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_codecs(mut self, codecs: Codecs) -> Self {
        self.codecs = codecs;
        self
    }

    #[must_use]
    pub fn supports_instancing(&self) -> bool {
        self.version >= GRID_INSTANCING
    }

    #[must_use]
    pub fn has_grid_compression(&self) -> bool {
        self.version >= NODE_MASK_COMPRESSION
    }

    #[must_use]
    pub fn has_new_transforms(&self) -> bool {
        self.version >= NEW_TRANSFORM
    }

    /// Whether a delayed-load entry was seen in this file.
    #[must_use]
    pub fn uses_delayed_load(&self) -> bool {
        self.delayed_load.is_some()
    }
}
