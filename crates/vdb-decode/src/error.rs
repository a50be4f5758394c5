//! Error and warning types for grid decoding.
//!
//! Fatal problems are [`DecodeError`]s and abort the grid. Problems with a known
//! safe fallback are [`DecodeWarning`]s: they are logged, recorded on the grid,
//! and only become errors when [`DecodeOptions::strict`](crate::DecodeOptions)
//! is set.

use thiserror::Error;

/// Result alias used throughout the decoder.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Fatal decode failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The grid descriptor could not be read or its offsets are inconsistent.
    #[error("malformed grid header: {0}")]
    MalformedHeader(String),

    /// A primitive read or seek ran past the end of the stream.
    #[error("truncated stream: needed {needed} bytes at offset {offset}, stream is {len} bytes")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The tree layout cannot be decoded.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),

    /// The transform map type is not supported.
    #[error("unsupported transform map '{0}'")]
    UnsupportedTransform(String),

    /// A leaf uses a value encoding outside the known set.
    #[error("unsupported encoding {encoding} on leaf {leaf}")]
    UnsupportedLeafEncoding { leaf: usize, encoding: u8 },

    /// A required metadata entry is absent.
    #[error("missing metadata entry '{0}'")]
    MissingMetadata(String),

    /// A metadata entry is present but its value cannot be interpreted.
    #[error("invalid metadata '{name}': {reason}")]
    InvalidMetadata { name: String, reason: String },

    /// A compressed block needs a codec that is not registered.
    #[error("no {0} codec registered")]
    MissingCodec(&'static str),

    /// A codec failed to decompress a block.
    #[error("{codec} decompression failed: {reason}")]
    Decompression { codec: &'static str, reason: String },
}

/// Recoverable decode problem.
///
/// Each variant describes what was degraded; the decoder continues with a
/// defined fallback value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeWarning {
    #[error("old-style transform '{map_type}' not supported, mapping every point to the origin")]
    LegacyTransform { map_type: String },

    #[error("unsupported transform map '{map_type}', mapping every point to the origin")]
    UnsupportedTransform { map_type: String },

    #[error("multi-buffer trees unsupported ({buffer_count} buffers), tree left empty")]
    MultiBufferTree { buffer_count: u32 },

    #[error("{count} root children after the first were not buffer-decoded")]
    UnvisitedRootChildren { count: usize },

    #[error("unsupported encoding {encoding} on leaf {leaf}, copying mask bits as values from here on")]
    UnsupportedLeafEncoding { leaf: usize, encoding: u8 },

    #[error("precision type not found in the metadata, using float")]
    MissingValueType,

    #[error("unknown value type '{0}', using float")]
    UnknownValueType(String),

    #[error("no {codec} codec registered, {count} values set to background")]
    MissingCodec { codec: &'static str, count: usize },
}

impl From<DecodeWarning> for DecodeError {
    fn from(warning: DecodeWarning) -> Self {
        match warning {
            DecodeWarning::LegacyTransform { map_type }
            | DecodeWarning::UnsupportedTransform { map_type } => {
                Self::UnsupportedTransform(map_type)
            }
            w @ (DecodeWarning::MultiBufferTree { .. }
            | DecodeWarning::UnvisitedRootChildren { .. }) => {
                Self::UnsupportedTopology(w.to_string())
            }
            DecodeWarning::UnsupportedLeafEncoding { leaf, encoding } => {
                Self::UnsupportedLeafEncoding { leaf, encoding }
            }
            DecodeWarning::MissingValueType => Self::MissingMetadata("value_type".to_string()),
            DecodeWarning::UnknownValueType(value) => Self::InvalidMetadata {
                name: "value_type".to_string(),
                reason: format!("unknown value type '{value}'"),
            },
            DecodeWarning::MissingCodec { codec, .. } => Self::MissingCodec(codec),
        }
    }
}

/// Collects warnings for one grid decode.
#[derive(Debug, Default)]
pub struct Diagnostics {
    strict: bool,
    warnings: Vec<DecodeWarning>,
}

impl Diagnostics {
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            warnings: Vec::new(),
        }
    }

    /// Log and record a warning, or fail with the matching error in strict mode.
    pub fn report(&mut self, warning: DecodeWarning) -> DecodeResult<()> {
        if self.strict {
            return Err(warning.into());
        }
        tracing::warn!("{warning}");
        self.warnings.push(warning);
        Ok(())
    }

    #[must_use]
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn into_warnings(self) -> Vec<DecodeWarning> {
        self.warnings
    }
}
