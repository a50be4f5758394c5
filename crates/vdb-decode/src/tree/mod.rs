//! Sparse voxel tree: root, two internal levels and 8³ leaves.
//!
//! # Layout
//!
//! ```text
//! RootNode      background, tiles, children in stream order
//!  └ UpperNode  L1, 32³ slots, covers 4096³ voxels
//!     └ LowerNode  L2, 16³ slots, covers 128³ voxels
//!        └ LeafNode   L3, 8³ values
//! ```
//!
//! Internal levels keep a fixed-size table of optional children indexed by
//! slot, so traversal order is the slot order used on disk.

pub mod buffers;
pub mod internal;
pub mod leaf;
pub mod mask;
pub mod root;
pub mod values;

use glam::IVec3;

use crate::compression::{Codecs, CompressionFlags};
use crate::context::VersionContext;
use crate::cursor::ByteCursor;
use crate::error::{DecodeResult, DecodeWarning, Diagnostics};
use crate::precision::Precision;

pub use buffers::{BufferStats, decode_buffers};
pub use internal::{InternalNode, LowerNode, UpperNode};
pub use leaf::{LeafBuffer, LeafNode};
pub use mask::NodeMask;
pub use root::{RootNode, Tile};

/// A node type that can sit below an internal node.
pub trait ChildNode: Sized {
    /// Log2 of the voxel extent covered by one node along each axis.
    const TOTAL: u32;

    fn read_topology(reader: &mut NodeReader<'_, '_>, origin: IVec3) -> DecodeResult<Self>;

    fn origin(&self) -> IVec3;

    fn leaf_count(&self) -> usize;

    /// Stored leaf value at a global coordinate inside this node.
    fn get_value(&self, xyz: IVec3) -> Option<f64>;
}

/// Stream state for one tree decode.
///
/// Borrows the cursor and the codecs, and snapshots the grid-specific parts of
/// the [`VersionContext`].
pub struct NodeReader<'c, 'a> {
    pub cursor: &'c mut ByteCursor<'a>,
    pub version: u32,
    pub compression: CompressionFlags,
    pub codecs: &'c Codecs,
    pub precision: Precision,
    /// Value arrays of real grids are stored as half floats.
    pub half: bool,
    /// Grid background, known once the root has been read.
    pub background: f64,
    pub diagnostics: &'c mut Diagnostics,
}

impl<'c, 'a> NodeReader<'c, 'a> {
    pub fn new(
        cursor: &'c mut ByteCursor<'a>,
        ctx: &'c VersionContext,
        diagnostics: &'c mut Diagnostics,
    ) -> Self {
        Self {
            cursor,
            version: ctx.version,
            compression: ctx.compression,
            codecs: &ctx.codecs,
            precision: ctx.value_type,
            half: ctx.use_half,
            background: 0.0,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseTree {
    root: RootNode,
    leaf_count: usize,
}

impl SparseTree {
    /// Tree with no nodes and a zero background.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read the buffer count and, for single-buffer trees, the node topology.
    ///
    /// Multi-buffer trees are reported and yield an empty tree.
    pub fn decode_topology(reader: &mut NodeReader<'_, '_>) -> DecodeResult<Self> {
        let buffer_count = reader.cursor.read_u32()?;
        if buffer_count != 1 {
            reader
                .diagnostics
                .report(DecodeWarning::MultiBufferTree { buffer_count })?;
            return Ok(Self::empty());
        }

        let root = RootNode::read_topology(reader)?;
        let leaf_count = root.children().iter().map(ChildNode::leaf_count).sum();
        Ok(Self { root, leaf_count })
    }

    #[must_use]
    pub fn root(&self) -> &RootNode {
        &self.root
    }

    #[must_use]
    pub fn background(&self) -> f64 {
        self.root.background()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.children().is_empty()
    }

    /// Every leaf, in traversal order.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> {
        self.root
            .children()
            .iter()
            .flat_map(UpperNode::children)
            .flat_map(LowerNode::children)
    }
}
