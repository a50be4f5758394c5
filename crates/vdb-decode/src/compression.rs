//! Per-grid compression flags and the block codecs they select.

use std::io::Read;
use std::sync::Arc;

use flate2::read::ZlibDecoder;

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeResult};

/// Bit tested for the "none" flag. Zero, so the flag is never set.
pub const COMPRESS_NONE: u32 = 0x0;
pub const COMPRESS_ZIP: u32 = 0x1;
pub const COMPRESS_ACTIVE_MASK: u32 = 0x2;
pub const COMPRESS_BLOSC: u32 = 0x4;

/// Compression schemes enabled for a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionFlags {
    pub none: bool,
    pub zlib: bool,
    pub active_mask: bool,
    pub blosc: bool,
}

impl CompressionFlags {
    /// Derive the flags from the on-disk bitmask.
    ///
    /// `none` is a test against bit `0x0` and is therefore always `false`.
    #[must_use]
    #[allow(clippy::bad_bit_mask)]
    pub fn from_bits(bits: u32) -> Self {
        Self {
            none: bits & COMPRESS_NONE != 0,
            zlib: bits & COMPRESS_ZIP != 0,
            active_mask: bits & COMPRESS_ACTIVE_MASK != 0,
            blosc: bits & COMPRESS_BLOSC != 0,
        }
    }

    /// Read the 32-bit flag word.
    pub fn read(cursor: &mut ByteCursor<'_>) -> DecodeResult<Self> {
        cursor.read_u32().map(Self::from_bits)
    }
}

/// Block decompressor.
///
/// `expected_len` is the decoded size the caller needs. Implementations must
/// not inflate past it, and fail when the block decodes to fewer bytes.
pub trait Codec: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn decompress(&self, input: &[u8], expected_len: usize) -> DecodeResult<Vec<u8>>;
}

/// zlib streams, as written for `COMPRESS_ZIP`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompress(&self, input: &[u8], expected_len: usize) -> DecodeResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input).take(expected_len as u64);
        let mut out = Vec::with_capacity(expected_len);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| DecodeError::Decompression {
                codec: self.name(),
                reason: e.to_string(),
            })?;
        if out.len() < expected_len {
            return Err(DecodeError::Decompression {
                codec: self.name(),
                reason: format!("expected {expected_len} bytes, got {}", out.len()),
            });
        }
        Ok(out)
    }
}

/// Codecs available to the value decoder.
///
/// zlib is always present. No blosc implementation is bundled; register one
/// with [`Codecs::with_blosc`] to decode blosc-compressed grids.
#[derive(Debug, Clone)]
pub struct Codecs {
    pub zlib: Arc<dyn Codec>,
    pub blosc: Option<Arc<dyn Codec>>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            zlib: Arc::new(ZlibCodec),
            blosc: None,
        }
    }
}

impl Codecs {
    #[must_use]
    pub fn with_blosc(mut self, codec: Arc<dyn Codec>) -> Self {
        self.blosc = Some(codec);
        self
    }
}

/// A length-prefixed block as stored in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    /// Stored uncompressed (non-positive length prefix).
    Raw(&'a [u8]),
    /// Compressed payload.
    Compressed(&'a [u8]),
}

impl<'a> Block<'a> {
    /// Read an `i64` length prefix and the bytes it covers.
    pub fn read(cursor: &mut ByteCursor<'a>) -> DecodeResult<Self> {
        let len = cursor.read_i64()?;
        let size = usize::try_from(len.unsigned_abs()).map_err(|_| DecodeError::TruncatedStream {
            offset: cursor.offset(),
            needed: usize::MAX,
            len: cursor.len(),
        })?;
        let bytes = cursor.read_bytes(size)?;
        Ok(if len <= 0 {
            Self::Raw(bytes)
        } else {
            Self::Compressed(bytes)
        })
    }

    /// Decode the block, returning `None` when it is compressed and no codec is
    /// available.
    pub fn decode(
        self,
        codec: Option<&dyn Codec>,
        expected_len: usize,
    ) -> DecodeResult<Option<Vec<u8>>> {
        match (self, codec) {
            (Self::Raw(bytes), _) => Ok(Some(bytes.to_vec())),
            (Self::Compressed(bytes), Some(codec)) => {
                codec.decompress(bytes, expected_len).map(Some)
            }
            (Self::Compressed(_), None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zlib_only() {
        let flags = CompressionFlags::from_bits(0x1);
        assert!(flags.zlib);
        assert!(!flags.active_mask);
        assert!(!flags.blosc);
    }

    #[test]
    fn active_mask_and_blosc() {
        let flags = CompressionFlags::from_bits(0x6);
        assert!(!flags.zlib);
        assert!(flags.active_mask);
        assert!(flags.blosc);
    }

    #[test]
    fn none_flag_is_never_set() {
        // Bit 0x0 can never test true; this pins that behaviour.
        assert!(!CompressionFlags::from_bits(0).none);
        assert!(!CompressionFlags::from_bits(u32::MAX).none);
    }

    proptest! {
        #[test]
        fn flags_follow_their_bits(bits in any::<u32>()) {
            let flags = CompressionFlags::from_bits(bits);
            prop_assert!(!flags.none);
            prop_assert_eq!(flags.zlib, bits & 1 != 0);
            prop_assert_eq!(flags.active_mask, bits & 2 != 0);
            prop_assert_eq!(flags.blosc, bits & 4 != 0);
        }
    }

    #[test]
    fn raw_block_with_negative_length() {
        let mut bytes = (-3i64).to_le_bytes().to_vec();
        bytes.extend_from_slice(&[9, 8, 7, 6]);
        let mut cursor = ByteCursor::new(&bytes);
        let block = Block::read(&mut cursor).unwrap();
        assert_eq!(block, Block::Raw(&[9, 8, 7]));
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn zlib_block_round_trips_through_codec() {
        let plain: Vec<u8> = (0..64).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let zipped = encoder.finish().unwrap();

        let mut bytes = i64::try_from(zipped.len()).unwrap().to_le_bytes().to_vec();
        bytes.extend_from_slice(&zipped);
        let mut cursor = ByteCursor::new(&bytes);
        let block = Block::read(&mut cursor).unwrap();
        let codecs = Codecs::default();
        let decoded = block.decode(Some(codecs.zlib.as_ref()), plain.len()).unwrap();
        assert_eq!(decoded, Some(plain));
    }

    #[test]
    fn compressed_block_without_codec_is_skipped() {
        let mut bytes = 2i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2]);
        let mut cursor = ByteCursor::new(&bytes);
        let block = Block::read(&mut cursor).unwrap();
        assert_eq!(block.decode(None, 8).unwrap(), None);
        assert_eq!(cursor.remaining(), 0);
    }

    fn zlib(plain: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn zlib_stops_at_expected_len() {
        let zipped = zlib(&vec![0u8; 16 << 20]);
        let out = ZlibCodec.decompress(&zipped, 2048).unwrap();
        assert_eq!(out.len(), 2048);
    }

    #[test]
    fn short_zlib_stream_is_an_error() {
        let zipped = zlib(&[7u8; 100]);
        let err = ZlibCodec.decompress(&zipped, 400).unwrap_err();
        assert!(matches!(err, DecodeError::Decompression { codec: "zlib", .. }));
    }

    #[test]
    fn corrupt_zlib_is_an_error() {
        let err = ZlibCodec.decompress(&[1, 2, 3, 4], 16).unwrap_err();
        assert!(matches!(err, DecodeError::Decompression { codec: "zlib", .. }));
    }
}
