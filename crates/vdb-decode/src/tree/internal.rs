//! Internal tree levels: sparse tables of child nodes and tile values.

use glam::IVec3;

use crate::context::NODE_MASK_COMPRESSION;
use crate::error::DecodeResult;

use super::leaf::LeafNode;
use super::mask::NodeMask;
use super::{ChildNode, NodeReader};

/// Internal node with `2^(3 * LOG2DIM)` slots. Each slot holds either a child
/// (`children[n]` is `Some`) or a tile value.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalNode<C, const LOG2DIM: u32> {
    origin: IVec3,
    child_mask: NodeMask,
    value_mask: NodeMask,
    tiles: Vec<f64>,
    children: Vec<Option<Box<C>>>,
}

/// Second internal level (L2), 16³ leaves.
pub type LowerNode = InternalNode<LeafNode, 4>;
/// First internal level (L1), 32³ lower nodes.
pub type UpperNode = InternalNode<LowerNode, 5>;

impl<C: ChildNode, const LOG2DIM: u32> InternalNode<C, LOG2DIM> {
    pub const SIZE: usize = 1 << (3 * LOG2DIM);
    const LOCAL_MASK: i32 = (1 << (LOG2DIM + C::TOTAL)) - 1;

    /// Slot of a global coordinate inside this node.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn offset_of(xyz: IVec3) -> usize {
        let local = (xyz & Self::LOCAL_MASK) >> C::TOTAL as i32;
        ((local.x << (2 * LOG2DIM)) | (local.y << LOG2DIM) | local.z) as usize
    }

    /// Origin of the child covering slot `n`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn child_origin(&self, n: usize) -> IVec3 {
        let dim = 1usize << LOG2DIM;
        let x = n >> (2 * LOG2DIM);
        let y = (n >> LOG2DIM) & (dim - 1);
        let z = n & (dim - 1);
        self.origin + (IVec3::new(x as i32, y as i32, z as i32) << C::TOTAL as i32)
    }

    #[must_use]
    pub fn child_mask(&self) -> &NodeMask {
        &self.child_mask
    }

    #[must_use]
    pub fn value_mask(&self) -> &NodeMask {
        &self.value_mask
    }

    #[must_use]
    pub fn child(&self, n: usize) -> Option<&C> {
        self.children.get(n)?.as_deref()
    }

    /// Tile value of a slot that holds no child. `None` past the last slot.
    #[must_use]
    pub fn tile_value(&self, n: usize) -> Option<f64> {
        if n >= Self::SIZE || self.child_mask.is_on(n) {
            return None;
        }
        self.tiles.get(n).copied()
    }

    /// Present children in slot order.
    pub fn children(&self) -> impl Iterator<Item = &C> {
        self.children.iter().filter_map(Option::as_deref)
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut C> {
        self.children.iter_mut().filter_map(Option::as_deref_mut)
    }
}

impl<C: ChildNode, const LOG2DIM: u32> ChildNode for InternalNode<C, LOG2DIM> {
    const TOTAL: u32 = LOG2DIM + C::TOTAL;

    fn read_topology(reader: &mut NodeReader<'_, '_>, origin: IVec3) -> DecodeResult<Self> {
        let child_mask = NodeMask::read(reader.cursor, Self::SIZE)?;
        let value_mask = NodeMask::read(reader.cursor, Self::SIZE)?;

        // Older files store tile values only for slots without a child.
        let tiles = if reader.version < NODE_MASK_COMPRESSION {
            let stored = reader.read_compressed_values(child_mask.count_off(), &value_mask)?;
            let mut stored = stored.into_iter();
            (0..Self::SIZE)
                .map(|n| {
                    if child_mask.is_on(n) {
                        reader.background
                    } else {
                        stored.next().unwrap_or(reader.background)
                    }
                })
                .collect()
        } else {
            reader.read_compressed_values(Self::SIZE, &value_mask)?
        };

        let mut node = Self {
            origin,
            child_mask,
            value_mask,
            tiles,
            children: std::iter::repeat_with(|| None).take(Self::SIZE).collect(),
        };
        let slots: Vec<usize> = node.child_mask.iter_on().collect();
        for n in slots {
            let child = C::read_topology(reader, node.child_origin(n))?;
            node.children[n] = Some(Box::new(child));
        }
        Ok(node)
    }

    fn origin(&self) -> IVec3 {
        self.origin
    }

    fn leaf_count(&self) -> usize {
        self.children().map(ChildNode::leaf_count).sum()
    }

    fn get_value(&self, xyz: IVec3) -> Option<f64> {
        self.child(Self::offset_of(xyz))?.get_value(xyz)
    }
}
