//! Per-block value codec shared by internal-node tiles and leaf buffers.
//!
//! A block starts with an encoding id describing how inactive values are
//! represented, optional inactive values and selection mask, then the value
//! array itself, which may hold only the active values when active-mask
//! compression is enabled.

use std::borrow::Cow;

use crate::compression::{Block, Codec};
use crate::context::NODE_MASK_COMPRESSION;
use crate::error::{DecodeError, DecodeResult, DecodeWarning};
use crate::precision::Precision;

use super::NodeReader;
use super::mask::NodeMask;

/// Inactive values are the background.
pub const NO_MASK_OR_INACTIVE_VALS: u8 = 0;
/// Inactive values are the negated background.
pub const NO_MASK_AND_MINUS_BG: u8 = 1;
/// One inactive value is stored.
pub const NO_MASK_AND_ONE_INACTIVE_VAL: u8 = 2;
/// Selection mask picks between background and its negation.
pub const MASK_AND_NO_INACTIVE_VALS: u8 = 3;
/// Selection mask picks between background and one stored value.
pub const MASK_AND_ONE_INACTIVE_VAL: u8 = 4;
/// Selection mask picks between two stored values.
pub const MASK_AND_TWO_INACTIVE_VALS: u8 = 5;
/// Every value is stored.
pub const NO_MASK_AND_ALL_VALS: u8 = 6;

/// Whether a leaf encoding id is one the decoder understands.
#[must_use]
pub fn is_known_encoding(encoding: u8) -> bool {
    encoding <= NO_MASK_AND_ALL_VALS
}

impl NodeReader<'_, '_> {
    /// Read a block's encoding id (when the version stores one) and its values.
    pub fn read_compressed_values(
        &mut self,
        count: usize,
        value_mask: &NodeMask,
    ) -> DecodeResult<Vec<f64>> {
        let encoding = if self.version >= NODE_MASK_COMPRESSION {
            self.cursor.read_u8()?
        } else {
            NO_MASK_AND_ALL_VALS
        };
        self.decode_values(encoding, count, value_mask)
    }

    /// Decode `count` values of a block whose encoding id was already read.
    pub fn decode_values(
        &mut self,
        encoding: u8,
        count: usize,
        value_mask: &NodeMask,
    ) -> DecodeResult<Vec<f64>> {
        let background = self.background;
        let mut inactive1 = background;
        let mut inactive0 = if encoding == NO_MASK_OR_INACTIVE_VALS {
            background
        } else {
            -background
        };

        if matches!(
            encoding,
            NO_MASK_AND_ONE_INACTIVE_VAL | MASK_AND_ONE_INACTIVE_VAL | MASK_AND_TWO_INACTIVE_VALS
        ) {
            inactive0 = self.precision.read(self.cursor)?;
            if encoding == MASK_AND_TWO_INACTIVE_VALS {
                inactive1 = self.precision.read(self.cursor)?;
            }
        }

        let selection = if matches!(
            encoding,
            MASK_AND_NO_INACTIVE_VALS | MASK_AND_ONE_INACTIVE_VAL | MASK_AND_TWO_INACTIVE_VALS
        ) {
            Some(NodeMask::read(self.cursor, value_mask.size())?)
        } else {
            None
        };

        let stored = if self.compression.active_mask
            && encoding != NO_MASK_AND_ALL_VALS
            && self.version >= NODE_MASK_COMPRESSION
        {
            value_mask.count_on()
        } else {
            count
        };

        let values = self.read_data(stored)?;
        if stored == count {
            return Ok(values);
        }

        // Scatter the active values and fill the gaps.
        let mut active = values.into_iter();
        let out = (0..count)
            .map(|n| {
                if value_mask.is_on(n) {
                    active.next().unwrap_or(background)
                } else if selection.as_ref().is_some_and(|s| s.is_on(n)) {
                    inactive1
                } else {
                    inactive0
                }
            })
            .collect();
        Ok(out)
    }

    /// Read a packed value array, decompressing it if the grid says so.
    fn read_data(&mut self, count: usize) -> DecodeResult<Vec<f64>> {
        let precision = if self.half && self.precision.is_real() {
            Precision::Half
        } else {
            self.precision
        };
        let byte_len = precision.size() * count;

        let (codec_name, bytes): (&'static str, Option<Cow<'_, [u8]>>) = if self.compression.blosc
        {
            let block = Block::read(self.cursor)?;
            ("blosc", block.decode(self.codecs.blosc.as_deref(), byte_len)?.map(Cow::Owned))
        } else if self.compression.zlib {
            let block = Block::read(self.cursor)?;
            let codec: &dyn Codec = self.codecs.zlib.as_ref();
            ("zlib", block.decode(Some(codec), byte_len)?.map(Cow::Owned))
        } else {
            ("raw", Some(Cow::Borrowed(self.cursor.read_bytes(byte_len)?)))
        };

        let Some(bytes) = bytes else {
            self.diagnostics.report(DecodeWarning::MissingCodec {
                codec: codec_name,
                count,
            })?;
            return Ok(vec![self.background; count]);
        };

        if bytes.len() < byte_len {
            return Err(DecodeError::Decompression {
                codec: codec_name,
                reason: format!("expected {byte_len} bytes, got {}", bytes.len()),
            });
        }
        precision.decode_array(&bytes[..byte_len])
    }
}
