//! Point queries against a decoded tree.

use glam::{DVec3, IVec3};

use crate::tree::SparseTree;

/// Read-only value lookup.
///
/// Coordinates with no stored leaf value (no child at some level, or a leaf
/// whose buffer was never decoded) read as the tree background.
#[derive(Debug, Clone, Copy)]
pub struct VoxelAccessor<'t> {
    tree: &'t SparseTree,
}

impl<'t> VoxelAccessor<'t> {
    #[must_use]
    pub fn new(tree: &'t SparseTree) -> Self {
        Self { tree }
    }

    #[must_use]
    pub fn get_value(&self, xyz: IVec3) -> f64 {
        self.tree
            .root()
            .get_value(xyz)
            .unwrap_or_else(|| self.tree.background())
    }

    /// Round a point to the nearest voxel and look it up.
    #[must_use]
    pub fn sample(&self, point: DVec3) -> f64 {
        self.get_value(point.round().as_ivec3())
    }

    /// Whether a leaf value is stored at `xyz`.
    #[must_use]
    pub fn is_stored(&self, xyz: IVec3) -> bool {
        self.tree.root().get_value(xyz).is_some()
    }
}
