//! Root level: background value, sparse tiles and top-level children.

use glam::IVec3;

use crate::error::DecodeResult;

use super::internal::UpperNode;
use super::{ChildNode, NodeReader};

/// Constant-valued region at the root level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub origin: IVec3,
    pub value: f64,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootNode {
    background: f64,
    tiles: Vec<Tile>,
    children: Vec<UpperNode>,
}

impl RootNode {
    /// Mask clearing the bits below an upper node's extent.
    const KEY_MASK: i32 = !((1 << UpperNode::TOTAL) - 1);

    /// Read the background, tiles and children. Sets the reader's background
    /// before any child is read.
    pub fn read_topology(reader: &mut NodeReader<'_, '_>) -> DecodeResult<Self> {
        let background = reader.precision.read(reader.cursor)?;
        reader.background = background;

        let tile_count = reader.cursor.read_u32()?;
        let child_count = reader.cursor.read_u32()?;

        let tiles = (0..tile_count)
            .map(|_| -> DecodeResult<Tile> {
                Ok(Tile {
                    origin: reader.cursor.read_ivec3()?,
                    value: reader.precision.read(reader.cursor)?,
                    active: reader.cursor.read_u8()? != 0,
                })
            })
            .collect::<DecodeResult<Vec<Tile>>>()?;

        // Counts come from the stream, so the vector grows as children are read.
        let mut children = Vec::new();
        for _ in 0..child_count {
            let origin = reader.cursor.read_ivec3()?;
            children.push(UpperNode::read_topology(reader, origin)?);
        }

        tracing::debug!(
            background,
            tiles = tiles.len(),
            children = children.len(),
            "read root topology"
        );

        Ok(Self {
            background,
            tiles,
            children,
        })
    }

    #[must_use]
    pub fn background(&self) -> f64 {
        self.background
    }

    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Top-level children in stream order.
    #[must_use]
    pub fn children(&self) -> &[UpperNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [UpperNode] {
        &mut self.children
    }

    /// Child whose extent contains `xyz`.
    #[must_use]
    pub fn find_child(&self, xyz: IVec3) -> Option<&UpperNode> {
        let key = xyz & Self::KEY_MASK;
        self.children.iter().find(|child| child.origin() == key)
    }

    /// Value at `xyz`, `None` when no leaf value is stored there.
    #[must_use]
    pub fn get_value(&self, xyz: IVec3) -> Option<f64> {
        self.find_child(xyz)?.get_value(xyz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionContext;
    use crate::cursor::ByteCursor;
    use crate::error::{DecodeError, Diagnostics};

    fn root_bytes(tiles: u32, children: u32) -> Vec<u8> {
        let mut bytes = 0.5f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&tiles.to_le_bytes());
        bytes.extend_from_slice(&children.to_le_bytes());
        bytes
    }

    fn read_root(bytes: &[u8]) -> DecodeResult<RootNode> {
        let ctx = VersionContext::new(224);
        let mut diagnostics = Diagnostics::default();
        let mut cursor = ByteCursor::new(bytes);
        let mut reader = NodeReader::new(&mut cursor, &ctx, &mut diagnostics);
        RootNode::read_topology(&mut reader)
    }

    #[test]
    fn huge_child_count_on_short_stream_is_truncation() {
        let err = read_root(&root_bytes(0, u32::MAX)).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream { offset: 12, .. }));
    }

    #[test]
    fn huge_tile_count_on_short_stream_is_truncation() {
        let err = read_root(&root_bytes(u32::MAX, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream { .. }));
    }

    #[test]
    fn tiles_are_kept_in_stream_order() {
        let mut bytes = root_bytes(2, 0);
        for (origin, value, active) in [([0, 0, 0], 1.5f32, 1u8), ([4096, 0, -4096], -2.0, 0)] {
            for c in origin {
                bytes.extend_from_slice(&i32::to_le_bytes(c));
            }
            bytes.extend_from_slice(&value.to_le_bytes());
            bytes.push(active);
        }
        let root = read_root(&bytes).unwrap();
        assert_eq!(root.background(), 0.5);
        assert_eq!(
            root.tiles(),
            &[
                Tile {
                    origin: IVec3::ZERO,
                    value: 1.5,
                    active: true,
                },
                Tile {
                    origin: IVec3::new(4096, 0, -4096),
                    value: -2.0,
                    active: false,
                },
            ]
        );
        assert!(root.children().is_empty());
    }
}
