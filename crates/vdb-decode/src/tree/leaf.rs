//! Bottom tree level (L3): 8³ voxel blocks.

use glam::IVec3;

use crate::error::DecodeResult;

use super::mask::NodeMask;
use super::{ChildNode, NodeReader};

/// Value storage of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafBuffer {
    /// Topology is known but no values were decoded for this leaf.
    Pending,
    /// Values decoded from the buffer stream.
    Decoded(Vec<f64>),
    /// Occupancy mask bits copied in as values (`1.0` / `0.0`), used once an
    /// unknown leaf encoding has been met.
    MaskFallback(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    origin: IVec3,
    value_mask: NodeMask,
    buffer: LeafBuffer,
}

impl LeafNode {
    pub const LOG2DIM: u32 = 3;
    pub const DIM: i32 = 1 << Self::LOG2DIM;
    pub const SIZE: usize = 1 << (3 * Self::LOG2DIM);

    #[must_use]
    pub fn new(origin: IVec3, value_mask: NodeMask) -> Self {
        Self {
            origin,
            value_mask,
            buffer: LeafBuffer::Pending,
        }
    }

    /// Slot of a global coordinate inside this leaf.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn offset_of(xyz: IVec3) -> usize {
        let local = xyz & (Self::DIM - 1);
        ((local.x << (2 * Self::LOG2DIM)) | (local.y << Self::LOG2DIM) | local.z) as usize
    }

    #[must_use]
    pub fn value_mask(&self) -> &NodeMask {
        &self.value_mask
    }

    #[must_use]
    pub fn buffer(&self) -> &LeafBuffer {
        &self.buffer
    }

    pub fn set_buffer(&mut self, buffer: LeafBuffer) {
        self.buffer = buffer;
    }

    /// Value at a slot, if this leaf holds values.
    #[must_use]
    pub fn value(&self, offset: usize) -> Option<f64> {
        match &self.buffer {
            LeafBuffer::Pending => None,
            LeafBuffer::Decoded(values) | LeafBuffer::MaskFallback(values) => {
                values.get(offset).copied()
            }
        }
    }
}

impl ChildNode for LeafNode {
    const TOTAL: u32 = Self::LOG2DIM;

    fn read_topology(reader: &mut NodeReader<'_, '_>, origin: IVec3) -> DecodeResult<Self> {
        let value_mask = NodeMask::read(reader.cursor, Self::SIZE)?;
        Ok(Self::new(origin, value_mask))
    }

    fn origin(&self) -> IVec3 {
        self.origin
    }

    fn leaf_count(&self) -> usize {
        1
    }

    fn get_value(&self, xyz: IVec3) -> Option<f64> {
        self.value(Self::offset_of(xyz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_x_major() {
        assert_eq!(LeafNode::offset_of(IVec3::new(0, 0, 1)), 1);
        assert_eq!(LeafNode::offset_of(IVec3::new(0, 1, 0)), 8);
        assert_eq!(LeafNode::offset_of(IVec3::new(1, 0, 0)), 64);
        assert_eq!(LeafNode::offset_of(IVec3::new(15, 15, 15)), 511);
        assert_eq!(LeafNode::offset_of(IVec3::new(-1, -8, 8)), 7 * 64);
    }

    #[test]
    fn pending_leaves_have_no_values() {
        let mut leaf = LeafNode::new(IVec3::ZERO, NodeMask::new(LeafNode::SIZE));
        assert_eq!(leaf.get_value(IVec3::ZERO), None);
        leaf.set_buffer(LeafBuffer::Decoded(vec![3.0; LeafNode::SIZE]));
        assert_eq!(leaf.get_value(IVec3::new(7, 7, 7)), Some(3.0));
    }
}
