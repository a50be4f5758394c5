//! Index-to-world transform maps.
//!
//! Only the axis-aligned affine maps are decoded. Other map types are read by
//! name only and leave every vector zero, so [`TransformMap::apply`] sends all
//! points to the origin for them. Callers may use that as a sentinel.

use glam::DVec3;

use crate::context::NEW_TRANSFORM;
use crate::cursor::ByteCursor;
use crate::error::{DecodeResult, DecodeWarning, Diagnostics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapKind {
    UniformScaleTranslate,
    ScaleTranslate,
    UniformScale,
    Scale,
    Translation,
    Unitary,
    NonlinearFrustum,
    /// Any other map type, typically a full 4x4 affine matrix.
    GenericMatrix,
    /// Written before transforms were versioned; not decoded.
    Legacy,
}

impl MapKind {
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "UniformScaleTranslateMap" => Self::UniformScaleTranslate,
            "ScaleTranslateMap" => Self::ScaleTranslate,
            "UniformScaleMap" => Self::UniformScale,
            "ScaleMap" => Self::Scale,
            "TranslationMap" => Self::Translation,
            "UnitaryMap" => Self::Unitary,
            "NonlinearFrustumMap" => Self::NonlinearFrustum,
            _ => Self::GenericMatrix,
        }
    }

    /// Whether the map's vectors are decoded.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::UniformScaleTranslate
                | Self::ScaleTranslate
                | Self::UniformScale
                | Self::Scale
                | Self::Translation
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformMap {
    pub kind: MapKind,
    /// Map type name as stored.
    pub type_name: String,
    pub translation: DVec3,
    pub scale: DVec3,
    pub voxel_size: DVec3,
    pub scale_inverse: DVec3,
    pub scale_inverse_sq: DVec3,
    pub scale_inverse_double: DVec3,
}

impl TransformMap {
    /// A map of the given kind with every vector zero.
    #[must_use]
    pub fn zeroed(kind: MapKind, type_name: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            translation: DVec3::ZERO,
            scale: DVec3::ZERO,
            voxel_size: DVec3::ZERO,
            scale_inverse: DVec3::ZERO,
            scale_inverse_sq: DVec3::ZERO,
            scale_inverse_double: DVec3::ZERO,
        }
    }

    /// Decode a map: type name, then the vectors that type defines.
    pub fn decode(
        cursor: &mut ByteCursor<'_>,
        version: u32,
        diagnostics: &mut Diagnostics,
    ) -> DecodeResult<Self> {
        let type_name = cursor.read_string()?;

        if version < NEW_TRANSFORM {
            diagnostics.report(DecodeWarning::LegacyTransform {
                map_type: type_name.clone(),
            })?;
            return Ok(Self::zeroed(MapKind::Legacy, type_name));
        }

        let kind = MapKind::from_type_name(&type_name);
        let mut map = Self::zeroed(kind, type_name);
        // Every map vector is stored as three f64, whatever the grid's value type.
        match map.kind {
            MapKind::UniformScaleTranslate | MapKind::ScaleTranslate => {
                map.translation = cursor.read_vec3d()?;
                map.read_scale_vectors(cursor)?;
            }
            MapKind::UniformScale | MapKind::Scale => map.read_scale_vectors(cursor)?,
            MapKind::Translation => map.translation = cursor.read_vec3d()?,
            MapKind::Unitary
            | MapKind::NonlinearFrustum
            | MapKind::GenericMatrix
            | MapKind::Legacy => {
                diagnostics.report(DecodeWarning::UnsupportedTransform {
                    map_type: map.type_name.clone(),
                })?;
            }
        }
        Ok(map)
    }

    fn read_scale_vectors(&mut self, cursor: &mut ByteCursor<'_>) -> DecodeResult<()> {
        self.scale = cursor.read_vec3d()?;
        self.voxel_size = cursor.read_vec3d()?;
        self.scale_inverse = cursor.read_vec3d()?;
        self.scale_inverse_sq = cursor.read_vec3d()?;
        self.scale_inverse_double = cursor.read_vec3d()?;
        Ok(())
    }

    /// Map an index-space point to world space: `translation + scale * p`.
    #[must_use]
    pub fn apply(&self, point: DVec3) -> DVec3 {
        self.translation + self.scale * point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Vec<u8> {
        let mut out = u32::try_from(s.len()).unwrap().to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn vec3d(bytes: &mut Vec<u8>, v: [f64; 3]) {
        for c in v {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
    }

    #[test]
    fn scale_translate_maps_origin_to_translation() {
        let mut bytes = string("ScaleTranslateMap");
        vec3d(&mut bytes, [1.0, 0.0, 0.0]);
        vec3d(&mut bytes, [2.0, 2.0, 2.0]);
        for v in [[2.0; 3], [0.5; 3], [0.25; 3], [0.25; 3]] {
            vec3d(&mut bytes, v);
        }
        let mut cursor = ByteCursor::new(&bytes);
        let mut diagnostics = Diagnostics::default();
        let map = TransformMap::decode(&mut cursor, 224, &mut diagnostics).unwrap();

        assert_eq!(map.kind, MapKind::ScaleTranslate);
        assert_eq!(map.apply(DVec3::ZERO), DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(map.apply(DVec3::new(1.0, 2.0, 3.0)), DVec3::new(3.0, 4.0, 6.0));
        assert_eq!(map.voxel_size, DVec3::splat(2.0));
        assert_eq!(cursor.remaining(), 0);
        assert!(diagnostics.warnings().is_empty());
    }

    #[test]
    fn translation_is_read_as_doubles() {
        let mut bytes = string("TranslationMap");
        for c in [1.5f32, 2.5, 3.5] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        let err = TransformMap::decode(
            &mut ByteCursor::new(&bytes),
            224,
            &mut Diagnostics::default(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::DecodeError::TruncatedStream { needed: 8, .. }));

        let mut bytes = string("TranslationMap");
        vec3d(&mut bytes, [0.1, 1e300, -2.0]);
        let map = TransformMap::decode(&mut ByteCursor::new(&bytes), 224, &mut Diagnostics::default())
            .unwrap();
        assert_eq!(map.translation, DVec3::new(0.1, 1e300, -2.0));
    }

    #[test]
    fn scale_map_has_no_translation() {
        let mut bytes = string("UniformScaleMap");
        for v in [[0.1; 3], [0.1; 3], [10.0; 3], [100.0; 3], [5.0; 3]] {
            vec3d(&mut bytes, v);
        }
        let mut cursor = ByteCursor::new(&bytes);
        let map = TransformMap::decode(&mut cursor, 224, &mut Diagnostics::default()).unwrap();
        assert_eq!(map.translation, DVec3::ZERO);
        assert_eq!(map.scale_inverse_double, DVec3::splat(5.0));
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn translation_map_collapses_scale_to_zero() {
        let mut bytes = string("TranslationMap");
        vec3d(&mut bytes, [4.0, 5.0, 6.0]);
        let mut cursor = ByteCursor::new(&bytes);
        let map = TransformMap::decode(&mut cursor, 224, &mut Diagnostics::default()).unwrap();
        assert_eq!(map.apply(DVec3::splat(9.0)), DVec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn unsupported_maps_read_nothing_and_map_to_zero() {
        for name in ["UnitaryMap", "NonlinearFrustumMap", "AffineMap"] {
            let mut bytes = string(name);
            bytes.extend_from_slice(&[0xff; 8]);
            let mut cursor = ByteCursor::new(&bytes);
            let mut diagnostics = Diagnostics::default();
            let map = TransformMap::decode(&mut cursor, 224, &mut diagnostics).unwrap();
            assert!(!map.kind.is_supported());
            assert_eq!(cursor.remaining(), 8);
            assert_eq!(map.apply(DVec3::new(3.0, -2.0, 1.0)), DVec3::ZERO);
            assert_eq!(diagnostics.warnings().len(), 1);
        }
    }

    #[test]
    fn legacy_versions_stop_after_the_name() {
        let mut bytes = string("ScaleTranslateMap");
        vec3d(&mut bytes, [1.0, 1.0, 1.0]);
        let mut cursor = ByteCursor::new(&bytes);
        let mut diagnostics = Diagnostics::default();
        let map = TransformMap::decode(&mut cursor, 218, &mut diagnostics).unwrap();
        assert_eq!(map.kind, MapKind::Legacy);
        assert_eq!(cursor.remaining(), 24);
        assert!(matches!(
            diagnostics.warnings(),
            [DecodeWarning::LegacyTransform { .. }]
        ));
    }

    #[test]
    fn strict_mode_rejects_unsupported_maps() {
        let bytes = string("UnitaryMap");
        let mut cursor = ByteCursor::new(&bytes);
        let err = TransformMap::decode(&mut cursor, 224, &mut Diagnostics::new(true)).unwrap_err();
        assert!(matches!(err, crate::DecodeError::UnsupportedTransform(name) if name == "UnitaryMap"));
    }
}
