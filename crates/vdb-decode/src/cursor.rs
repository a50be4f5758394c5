//! Sequential little-endian reader over a borrowed byte buffer.

use std::fmt::Write as _;

use glam::{DVec3, IVec3};

use crate::error::{DecodeError, DecodeResult};

/// Seekable cursor over an immutable byte slice.
///
/// Cloning a cursor gives an independent view of the same bytes.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current absolute position.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Move to an absolute position. Seeking to the very end is allowed.
    pub fn seek(&mut self, pos: usize) -> DecodeResult<()> {
        if pos > self.data.len() {
            return Err(DecodeError::TruncatedStream {
                offset: pos,
                needed: 0,
                len: self.data.len(),
            });
        }
        self.offset = pos;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::TruncatedStream {
                offset: self.offset,
                needed: n,
                len: self.data.len(),
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> DecodeResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Three `f64` components, as transform maps store them.
    pub fn read_vec3d(&mut self) -> DecodeResult<DVec3> {
        Ok(DVec3::new(self.read_f64()?, self.read_f64()?, self.read_f64()?))
    }

    pub fn read_ivec3(&mut self) -> DecodeResult<IVec3> {
        Ok(IVec3::new(self.read_i32()?, self.read_i32()?, self.read_i32()?))
    }

    /// `u32` length-prefixed string. Invalid UTF-8 is replaced, not rejected.
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a `u32` size-prefixed metadata payload and render it as text
    /// according to its type name.
    ///
    /// Numeric types are formatted with `Display`, vectors and matrices as
    /// comma-separated components, strings are returned as stored. Unknown
    /// types are rendered as lowercase hex of the raw payload.
    pub fn read_metadata_value(&mut self, type_name: &str) -> DecodeResult<String> {
        let size = self.read_u32()? as usize;
        let payload = self.read_bytes(size)?;
        let mut value = ByteCursor::new(payload);
        let text = match type_name {
            "string" => String::from_utf8_lossy(payload).into_owned(),
            "bool" => (value.read_u8()? != 0).to_string(),
            "int32" => value.read_i32()?.to_string(),
            "int64" => value.read_i64()?.to_string(),
            "float" => value.read_f32()?.to_string(),
            "double" => value.read_f64()?.to_string(),
            "vec2i" => join(2, || value.read_i32())?,
            "vec2s" => join(2, || value.read_f32())?,
            "vec2d" => join(2, || value.read_f64())?,
            "vec3i" => join(3, || value.read_i32())?,
            "vec3s" => join(3, || value.read_f32())?,
            "vec3d" => join(3, || value.read_f64())?,
            "mat4s" => join(16, || value.read_f32())?,
            "mat4d" => join(16, || value.read_f64())?,
            _ => payload.iter().fold(String::new(), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            }),
        };
        Ok(text)
    }
}

fn join<T: ToString>(
    count: usize,
    mut read: impl FnMut() -> DecodeResult<T>,
) -> DecodeResult<String> {
    let parts = (0..count)
        .map(|_| read().map(|v| v.to_string()))
        .collect::<DecodeResult<Vec<_>>>()?;
    Ok(parts.join(","))
}
