//! Decode sparse-voxel grids from the OpenVDB binary format.
//!
//! This crate reads one grid at a time from an in-memory byte buffer: its
//! descriptor, metadata, index-to-world transform and a float-valued sparse
//! tree with a fixed 5-4-3 node layout. Container parsing (file header, grid
//! count) is left to the caller, which hands each grid a shared
//! [`VersionContext`].
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **Zero-copy input**: Decoding borrows the caller's bytes
//! - **Degrade, then report**: Unsupported features decode to documented
//!   fallbacks and record a [`DecodeWarning`]; [`DecodeOptions::strict`] turns
//!   those into errors
//!
//! # Key functions
//!
//! - [`Grid::decode`]: Decode one grid and leave the cursor at its end
//! - [`Grid::get_value`]: Nearest-voxel lookup in index space
//! - [`Grid::precise_world_bbox`]: World bounds from bbox metadata
//! - [`TransformMap::apply`]: Index-to-world mapping
//! - [`MetadataTable::value_or_undefined`]: Metadata lookup by name

mod error;

pub mod accessor;
pub mod compression;
pub mod context;
pub mod cursor;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
pub mod grid;
pub mod metadata;
pub mod precision;
pub mod transform;
pub mod tree;

pub use accessor::VoxelAccessor;
pub use compression::{Codec, Codecs, CompressionFlags, ZlibCodec};
pub use context::{DecodeOptions, VersionContext};
pub use cursor::ByteCursor;
pub use error::{DecodeError, DecodeResult, DecodeWarning, Diagnostics};
pub use grid::{Grid, GridHeader};
pub use metadata::{MetadataEntry, MetadataTable};
pub use precision::Precision;
pub use transform::{MapKind, TransformMap};
pub use tree::SparseTree;

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min: glam::DVec3,
    pub max: glam::DVec3,
}

impl Bbox {
    #[must_use]
    pub fn size(&self) -> glam::DVec3 {
        self.max - self.min
    }
}
