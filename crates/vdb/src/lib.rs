//! Read OpenVDB files and the grids they contain.
//!
//! This crate parses the archive header and file-level metadata, then hands
//! each grid to [`vdb_decode::Grid::decode`] on one shared cursor and
//! [`VersionContext`]. Grid decoding itself lives in `vdb-decode`.
//!
//! # Example
//!
//! ```no_run
//! let file = vdb::VdbFile::open("smoke.vdb")?;
//! for grid in file.grids() {
//!     println!("{}: {} leaves", grid.name(), grid.tree().leaf_count());
//! }
//! # Ok::<(), vdb::Error>(())
//! ```

use std::path::Path;

use glam::DVec3;
use thiserror::Error;
use vdb_decode::compression::COMPRESS_ZIP;
use vdb_decode::context::NODE_MASK_COMPRESSION;
use vdb_decode::{
    Bbox, ByteCursor, Codecs, CompressionFlags, DecodeError, DecodeOptions, DecodeWarning, Grid,
    MetadataTable, VersionContext,
};

pub use vdb_decode;

/// `" BDV"` read as a little-endian `i64`.
pub const MAGIC: i64 = 0x5644_4220;
/// First file version with a file-level compression byte.
pub const FILE_COMPRESSION: u32 = 220;
/// First file version storing the UUID as 36 ASCII characters.
pub const ASCII_UUID: u32 = 218;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("not an OpenVDB file (magic {0:#x})")]
    InvalidMagic(i64),

    #[error("files without grid offsets are not supported")]
    MissingGridOffsets,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Archive header at the start of every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub library_major: u32,
    pub library_minor: u32,
    pub has_grid_offsets: bool,
    /// Compression inherited by grids of files without per-grid flags.
    pub compression: CompressionFlags,
    pub uuid: String,
}

impl FileHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let magic = cursor.read_i64()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let version = cursor.read_u32()?;
        let library_major = cursor.read_u32()?;
        let library_minor = cursor.read_u32()?;
        let has_grid_offsets = cursor.read_u8()? != 0;

        let compression = if version >= NODE_MASK_COMPRESSION {
            CompressionFlags::default()
        } else if version >= FILE_COMPRESSION {
            if cursor.read_u8()? != 0 {
                CompressionFlags::from_bits(COMPRESS_ZIP)
            } else {
                CompressionFlags::default()
            }
        } else {
            CompressionFlags::from_bits(COMPRESS_ZIP)
        };

        let uuid = if version >= ASCII_UUID {
            String::from_utf8_lossy(cursor.read_bytes(36)?).into_owned()
        } else {
            cursor
                .read_bytes(16)?
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect()
        };

        Ok(Self {
            version,
            library_major,
            library_minor,
            has_grid_offsets,
            compression,
            uuid,
        })
    }
}

/// A fully decoded file.
#[derive(Debug, Clone)]
pub struct VdbFile {
    header: FileHeader,
    metadata: MetadataTable,
    grids: Vec<Grid>,
}

impl VdbFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DecodeOptions::default(), Codecs::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        options: DecodeOptions,
        codecs: Codecs,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read file");
        Self::from_bytes_with(&bytes, options, codecs)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, DecodeOptions::default(), Codecs::default())
    }

    /// Decode the header, file metadata and every grid in order.
    pub fn from_bytes_with(bytes: &[u8], options: DecodeOptions, codecs: Codecs) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let header = FileHeader::read(&mut cursor)?;
        if !header.has_grid_offsets {
            return Err(Error::MissingGridOffsets);
        }

        let metadata = MetadataTable::read(&mut cursor)?;
        let grid_count = cursor.read_u32()?;
        tracing::debug!(
            version = header.version,
            library = format!("{}.{}", header.library_major, header.library_minor),
            grid_count,
            "reading grids"
        );

        let mut ctx = VersionContext::new(header.version)
            .with_compression(header.compression)
            .with_options(options)
            .with_codecs(codecs);
        let mut grids = Vec::new();
        for _ in 0..grid_count {
            grids.push(Grid::decode(&mut cursor, &mut ctx)?);
        }

        Ok(Self {
            header,
            metadata,
            grids,
        })
    }

    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// File-level metadata.
    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    #[must_use]
    pub fn grids(&self) -> &[Grid] {
        &self.grids
    }

    #[must_use]
    pub fn into_grids(self) -> Vec<Grid> {
        self.grids
    }

    /// First grid with the given display name.
    #[must_use]
    pub fn grid(&self, name: &str) -> Option<&Grid> {
        self.grids.iter().find(|grid| grid.name() == name)
    }

    /// Warnings from every grid, tagged with the grid name.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &DecodeWarning)> {
        self.grids
            .iter()
            .flat_map(|grid| grid.warnings().iter().map(move |w| (grid.name(), w)))
    }

    /// Union of the world bounds of grids that carry bbox metadata. Grids whose
    /// bounds cannot be computed are logged and left out.
    #[must_use]
    pub fn world_bounds(&self) -> Option<Bbox> {
        self.grids
            .iter()
            .filter_map(|grid| match grid.precise_world_bbox() {
                Ok(bbox) => Some(bbox),
                Err(e) => {
                    tracing::debug!(grid = grid.name(), "no world bounds: {e}");
                    None
                }
            })
            .reduce(|a, b| Bbox {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            })
    }

    /// Value of the named grid at the voxel nearest to `point`.
    #[must_use]
    pub fn sample(&self, name: &str, point: DVec3) -> Option<f64> {
        self.grid(name).map(|grid| grid.get_value(point))
    }
}
