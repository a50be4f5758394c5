//! Voxel scalar kinds and their on-disk representation.

use crate::cursor::ByteCursor;
use crate::error::DecodeResult;

/// Numeric kind of a grid's voxel values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    Half,
    #[default]
    Float,
    Double,
    Int32,
    Int64,
}

impl Precision {
    /// Map a `value_type` metadata string to a precision.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "half" => Some(Self::Half),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Half => "half",
            Self::Float => "float",
            Self::Double => "double",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
        }
    }

    /// Bytes per stored value.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Half => 2,
            Self::Float | Self::Int32 => 4,
            Self::Double | Self::Int64 => 8,
        }
    }

    /// Whether half-float storage applies to this kind.
    #[must_use]
    pub fn is_real(self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double)
    }

    /// Read one full-width value.
    pub fn read(self, cursor: &mut ByteCursor<'_>) -> DecodeResult<f64> {
        Ok(match self {
            Self::Half => f64::from(half_to_f32(cursor.read_u16()?)),
            Self::Float => f64::from(cursor.read_f32()?),
            Self::Double => cursor.read_f64()?,
            Self::Int32 => f64::from(cursor.read_i32()?),
            #[allow(clippy::cast_precision_loss)]
            Self::Int64 => cursor.read_i64()? as f64,
        })
    }

    /// Decode a packed little-endian array of this kind.
    pub fn decode_array(self, bytes: &[u8]) -> DecodeResult<Vec<f64>> {
        let mut cursor = ByteCursor::new(bytes);
        (0..bytes.len() / self.size())
            .map(|_| self.read(&mut cursor))
            .collect()
    }
}

/// Convert IEEE 754 binary16 bits to `f32`.
#[must_use]
pub fn half_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1f);
    let mantissa = u32::from(bits & 0x3ff);

    let magnitude = match (exponent, mantissa) {
        (0, 0) => 0,
        (0, m) => {
            // Subnormal: value is m * 2^-24.
            #[allow(clippy::cast_precision_loss)]
            let value = m as f32 * f32::from_bits(0x3380_0000);
            value.to_bits()
        }
        (0x1f, 0) => 0x7f80_0000,
        (0x1f, m) => 0x7fc0_0000 | (m << 13),
        (e, m) => ((e + 127 - 15) << 23) | (m << 13),
    };
    f32::from_bits(sign | magnitude)
}
