//! Grid descriptor and the full single-grid decode pipeline.

use glam::{DVec3, IVec3};

use crate::Bbox;
use crate::accessor::VoxelAccessor;
use crate::compression::CompressionFlags;
use crate::context::{NEW_TRANSFORM, VersionContext};
use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeResult, DecodeWarning, Diagnostics};
use crate::metadata::MetadataTable;
use crate::precision::Precision;
use crate::transform::TransformMap;
use crate::tree::{BufferStats, NodeReader, SparseTree, decode_buffers};

/// Grid type names of half-float grids contain this marker.
pub const HALF_FLOAT_TYPENAME_SUFFIX: &str = "_HalfFloat";
/// Separates the display name from the uniquifying suffix in unique names.
pub const UNIQUE_NAME_SEPARATOR: char = '\u{1e}';

/// Grid descriptor read ahead of the grid data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridHeader {
    pub unique_name: String,
    /// `unique_name` up to the first separator.
    pub display_name: String,
    pub grid_type: String,
    pub half_float: bool,
    pub instance_parent: Option<String>,
    /// Where the descriptor ends and the grid data starts.
    pub grid_data_end: u64,
    /// Where the grid's block data ends.
    pub block_data_end: u64,
    /// Where the next grid (or the end of the file) starts.
    pub file_end: u64,
}

impl GridHeader {
    /// Read the descriptor. Running out of bytes here is a malformed header.
    pub fn read(cursor: &mut ByteCursor<'_>, ctx: &VersionContext) -> DecodeResult<Self> {
        Self::read_fields(cursor, ctx).map_err(|e| match e {
            DecodeError::TruncatedStream {
                offset,
                needed,
                len,
            } => DecodeError::MalformedHeader(format!(
                "stream of {len} bytes ended reading {needed} bytes at {offset}"
            )),
            other => other,
        })
    }

    fn read_fields(cursor: &mut ByteCursor<'_>, ctx: &VersionContext) -> DecodeResult<Self> {
        let unique_name = cursor.read_string()?;
        let display_name = unique_name
            .split(UNIQUE_NAME_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string();

        let grid_type = cursor.read_string()?;
        // TODO: strip HALF_FLOAT_TYPENAME_SUFFIX from grid_type once callers no
        // longer match on the stored type name.
        let half_float = grid_type.contains(HALF_FLOAT_TYPENAME_SUFFIX);

        let instance_parent = if ctx.supports_instancing() {
            Some(cursor.read_string()?).filter(|name| !name.is_empty())
        } else {
            None
        };

        let grid_data_end = read_offset(cursor, "grid data")?;
        let block_data_end = read_offset(cursor, "block data")?;
        let file_end = read_offset(cursor, "end")?;
        if grid_data_end > block_data_end || block_data_end > file_end {
            return Err(DecodeError::MalformedHeader(format!(
                "offsets out of order: grid data {grid_data_end}, block data {block_data_end}, end {file_end}"
            )));
        }

        Ok(Self {
            unique_name,
            display_name,
            grid_type,
            half_float,
            instance_parent,
            grid_data_end,
            block_data_end,
            file_end,
        })
    }
}

fn read_offset(cursor: &mut ByteCursor<'_>, what: &str) -> DecodeResult<u64> {
    let raw = cursor.read_i64()?;
    u64::try_from(raw)
        .map_err(|_| DecodeError::MalformedHeader(format!("negative {what} offset {raw}")))
}

fn seek_to(cursor: &mut ByteCursor<'_>, offset: u64) -> DecodeResult<()> {
    let pos = usize::try_from(offset)
        .map_err(|_| DecodeError::MalformedHeader(format!("offset {offset} not addressable")))?;
    cursor.seek(pos)
}

/// One decoded grid.
#[derive(Debug, Clone)]
pub struct Grid {
    header: GridHeader,
    compression: CompressionFlags,
    metadata: MetadataTable,
    precision: Precision,
    transform: TransformMap,
    tree: SparseTree,
    buffer_stats: BufferStats,
    warnings: Vec<DecodeWarning>,
}

impl Grid {
    /// Decode the grid starting at the cursor.
    ///
    /// On success the cursor rests at the grid's end offset, ready for the
    /// next grid, even when trailing grid data was not consumed.
    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &mut VersionContext) -> DecodeResult<Self> {
        let mut diagnostics = Diagnostics::new(ctx.options.strict);

        let header = GridHeader::read(cursor, ctx)?;
        tracing::debug!(
            name = %header.display_name,
            grid_type = %header.grid_type,
            offset = header.grid_data_end,
            "decoding grid"
        );
        if cursor.offset() as u64 != header.grid_data_end {
            seek_to(cursor, header.grid_data_end)?;
        }

        if ctx.has_grid_compression() {
            ctx.compression = CompressionFlags::read(cursor)?;
        }
        let compression = ctx.compression;

        let metadata = read_metadata(cursor, ctx, &header.display_name)?;
        let precision = resolve_precision(&metadata, &mut diagnostics)?;
        ctx.use_half = header.half_float;
        ctx.value_type = precision;

        let (transform, mut tree) = if ctx.supports_instancing() {
            let transform = TransformMap::decode(cursor, ctx.version, &mut diagnostics)?;
            let tree = decode_topology(cursor, ctx, &mut diagnostics)?;
            (transform, tree)
        } else {
            let tree = decode_topology(cursor, ctx, &mut diagnostics)?;
            let transform = TransformMap::decode(cursor, ctx.version, &mut diagnostics)?;
            (transform, tree)
        };

        let buffer_stats = {
            let mut reader = NodeReader::new(cursor, ctx, &mut diagnostics);
            reader.background = tree.background();
            decode_buffers(&mut tree, &mut reader)?
        };

        if cursor.offset() as u64 != header.block_data_end {
            tracing::debug!(
                offset = cursor.offset(),
                block_data_end = header.block_data_end,
                "grid data not fully consumed"
            );
        }
        seek_to(cursor, header.file_end)?;

        Ok(Self {
            header,
            compression,
            metadata,
            precision,
            transform,
            tree,
            buffer_stats,
            warnings: diagnostics.into_warnings(),
        })
    }

    #[must_use]
    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.header.display_name
    }

    #[must_use]
    pub fn grid_type(&self) -> &str {
        &self.header.grid_type
    }

    #[must_use]
    pub fn compression(&self) -> CompressionFlags {
        self.compression
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Value of the first metadata entry named `name`, or `"undefined"`.
    #[must_use]
    pub fn metadata_value(&self, name: &str) -> &str {
        self.metadata.value_or_undefined(name)
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    #[must_use]
    pub fn transform(&self) -> &TransformMap {
        &self.transform
    }

    #[must_use]
    pub fn tree(&self) -> &SparseTree {
        &self.tree
    }

    #[must_use]
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer_stats
    }

    /// Recoverable problems met while decoding.
    #[must_use]
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn accessor(&self) -> VoxelAccessor<'_> {
        VoxelAccessor::new(&self.tree)
    }

    /// Value at the voxel nearest to `point`.
    #[must_use]
    pub fn get_value(&self, point: DVec3) -> f64 {
        self.accessor().sample(point)
    }

    /// Value at an exact voxel coordinate.
    #[must_use]
    pub fn value_at(&self, xyz: IVec3) -> f64 {
        self.accessor().get_value(xyz)
    }

    /// World-space bounds from the `file_bbox_min`/`file_bbox_max` metadata.
    pub fn precise_world_bbox(&self) -> DecodeResult<Bbox> {
        let min = self.bbox_corner("file_bbox_min")?;
        let max = self.bbox_corner("file_bbox_max")?;
        Ok(Bbox {
            min: self.transform.apply(min),
            max: self.transform.apply(max),
        })
    }

    fn bbox_corner(&self, name: &str) -> DecodeResult<DVec3> {
        let entry = self
            .metadata
            .get(name)
            .ok_or_else(|| DecodeError::MissingMetadata(name.to_string()))?;
        parse_triple(name, &entry.value)
    }
}

/// Parse `"x,y,z"` into a vector.
pub fn parse_triple(name: &str, text: &str) -> DecodeResult<DVec3> {
    let invalid = |reason: String| DecodeError::InvalidMetadata {
        name: name.to_string(),
        reason,
    };
    let parts = text
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(format!("'{text}': {e}")))?;
    match parts[..] {
        [x, y, z] => Ok(DVec3::new(x, y, z)),
        _ => Err(invalid(format!(
            "'{text}': expected 3 components, found {}",
            parts.len()
        ))),
    }
}

fn read_metadata(
    cursor: &mut ByteCursor<'_>,
    ctx: &mut VersionContext,
    display_name: &str,
) -> DecodeResult<MetadataTable> {
    let mut metadata = MetadataTable::read(cursor)?;

    for entry in metadata.iter().filter(|e| e.name == "file_delayed_load") {
        ctx.delayed_load = Some(entry.value.clone());
    }

    if ctx.version < NEW_TRANSFORM {
        for entry in metadata.iter_mut().filter(|e| e.name == "name") {
            entry.value = display_name.to_string();
        }
    }
    Ok(metadata)
}

fn resolve_precision(
    metadata: &MetadataTable,
    diagnostics: &mut Diagnostics,
) -> DecodeResult<Precision> {
    let Some(entry) = metadata.get("value_type") else {
        diagnostics.report(DecodeWarning::MissingValueType)?;
        return Ok(Precision::Float);
    };
    if let Some(precision) = Precision::from_type_name(&entry.value) {
        return Ok(precision);
    }
    diagnostics.report(DecodeWarning::UnknownValueType(entry.value.clone()))?;
    Ok(Precision::Float)
}

fn decode_topology(
    cursor: &mut ByteCursor<'_>,
    ctx: &VersionContext,
    diagnostics: &mut Diagnostics,
) -> DecodeResult<SparseTree> {
    let mut reader = NodeReader::new(cursor, ctx, diagnostics);
    let tree = SparseTree::decode_topology(&mut reader)?;
    tracing::debug!(leaves = tree.leaf_count(), "read tree topology");
    Ok(tree)
}
