//! Byte-level grid writer for building decoder inputs in tests.
//!
//! Writes float grids the way the decoder expects to read them, for any file
//! version the decoder handles. Compressed blocks under the blosc flag hold
//! the raw bytes, since no blosc encoder is available here.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use glam::{DVec3, IVec3};

use crate::compression::{COMPRESS_ACTIVE_MASK, CompressionFlags};
use crate::context::{GRID_INSTANCING, NEW_TRANSFORM, NODE_MASK_COMPRESSION};
use crate::tree::values::{
    MASK_AND_NO_INACTIVE_VALS, MASK_AND_ONE_INACTIVE_VAL, MASK_AND_TWO_INACTIVE_VALS,
    NO_MASK_AND_ALL_VALS, NO_MASK_AND_ONE_INACTIVE_VAL, NO_MASK_OR_INACTIVE_VALS,
    is_known_encoding,
};
use crate::tree::{ChildNode, LeafNode, LowerNode, NodeMask, UpperNode};

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_ivec3(out: &mut Vec<u8>, v: IVec3) {
    for c in v.to_array() {
        out.extend_from_slice(&c.to_le_bytes());
    }
}

pub fn put_dvec3(out: &mut Vec<u8>, v: DVec3) {
    for c in v.to_array() {
        out.extend_from_slice(&c.to_le_bytes());
    }
}

#[allow(clippy::cast_possible_truncation)]
pub fn put_string(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

pub fn put_mask(out: &mut Vec<u8>, mask: &NodeMask) {
    for word in mask.words() {
        out.extend_from_slice(&word.to_le_bytes());
    }
}

/// One metadata entry: name, type name and raw payload.
#[derive(Debug, Clone)]
pub struct FixtureMeta {
    pub name: String,
    pub type_name: String,
    pub payload: Vec<u8>,
}

impl FixtureMeta {
    pub fn string(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: "string".to_string(),
            payload: value.as_bytes().to_vec(),
        }
    }

    pub fn vec3i(name: &str, value: [i32; 3]) -> Self {
        Self {
            name: name.to_string(),
            type_name: "vec3i".to_string(),
            payload: value.iter().flat_map(|c| c.to_le_bytes()).collect(),
        }
    }

    pub fn int64(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            type_name: "int64".to_string(),
            payload: value.to_le_bytes().to_vec(),
        }
    }
}

/// Count-prefixed metadata table.
#[allow(clippy::cast_possible_truncation)]
pub fn put_metadata(out: &mut Vec<u8>, entries: &[FixtureMeta]) {
    put_u32(out, entries.len() as u32);
    for entry in entries {
        put_string(out, &entry.name);
        put_string(out, &entry.type_name);
        put_u32(out, entry.payload.len() as u32);
        out.extend_from_slice(&entry.payload);
    }
}

#[derive(Debug, Clone)]
pub struct FixtureTransform {
    pub type_name: String,
    /// Written after the name when the version stores decodable transforms.
    pub vectors: Vec<DVec3>,
}

impl FixtureTransform {
    pub fn scale_translate(scale: DVec3, translation: DVec3) -> Self {
        Self {
            type_name: "ScaleTranslateMap".to_string(),
            vectors: vec![
                translation,
                scale,
                scale,
                scale.recip(),
                (scale * scale).recip(),
                (scale * 2.0).recip(),
            ],
        }
    }

    /// A map written by name only.
    pub fn named(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            vectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureLeaf {
    pub origin: IVec3,
    pub value_mask: NodeMask,
    pub encoding: u8,
    /// One value per voxel.
    pub values: Vec<f32>,
    /// Inactive values written for encodings that store them. `None` writes
    /// the grid background.
    pub inactive: Option<[f32; 2]>,
    /// Written for encodings that carry a selection mask.
    pub selection: NodeMask,
}

impl FixtureLeaf {
    /// Fully active leaf whose voxel at `xyz` holds `value(xyz)`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn dense(origin: IVec3, value: impl Fn(IVec3) -> f32) -> Self {
        let origin = origin & !(LeafNode::DIM - 1);
        let mut value_mask = NodeMask::new(LeafNode::SIZE);
        let values = (0..LeafNode::SIZE)
            .map(|n| {
                value_mask.set(n, true);
                let local = IVec3::new((n >> 6) as i32, ((n >> 3) & 7) as i32, (n & 7) as i32);
                value(origin + local)
            })
            .collect();
        Self {
            origin,
            value_mask,
            encoding: NO_MASK_AND_ALL_VALS,
            values,
            inactive: None,
            selection: NodeMask::new(LeafNode::SIZE),
        }
    }

    pub fn uniform(origin: IVec3, value: f32) -> Self {
        Self::dense(origin, |_| value)
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: u8) -> Self {
        self.encoding = encoding;
        self
    }

    /// Replace the occupancy mask. Values stay as they are.
    #[must_use]
    pub fn with_mask(mut self, value_mask: NodeMask) -> Self {
        self.value_mask = value_mask;
        self
    }

    /// Store `inactive` and `selection` with the block. Only the parts the
    /// encoding defines are written.
    #[must_use]
    pub fn with_inactive(mut self, inactive: [f32; 2], selection: NodeMask) -> Self {
        self.inactive = Some(inactive);
        self.selection = selection;
        self
    }
}

type LeafSlots<'l> = BTreeMap<usize, &'l FixtureLeaf>;
type LowerSlots<'l> = BTreeMap<usize, (IVec3, LeafSlots<'l>)>;

#[derive(Debug, Clone)]
pub struct FixtureGrid {
    pub unique_name: String,
    pub grid_type: String,
    pub instance_parent: String,
    /// Compression bits; only written for versions with per-grid flags but
    /// always used to lay out the value blocks.
    pub compression: u32,
    pub metadata: Vec<FixtureMeta>,
    pub transform: FixtureTransform,
    pub background: f32,
    pub buffer_count: u32,
    pub tiles: Vec<(IVec3, f32, bool)>,
    pub leaves: Vec<FixtureLeaf>,
    /// Bytes between the block data and the grid end.
    pub trailing: Vec<u8>,
}

impl FixtureGrid {
    /// Float grid with an identity transform, active-mask compression and a
    /// `value_type` entry.
    pub fn new(unique_name: &str) -> Self {
        Self {
            unique_name: unique_name.to_string(),
            grid_type: "Tree_float_5_4_3".to_string(),
            instance_parent: String::new(),
            compression: COMPRESS_ACTIVE_MASK,
            metadata: vec![FixtureMeta::string("value_type", "float")],
            transform: FixtureTransform::scale_translate(DVec3::ONE, DVec3::ZERO),
            background: 0.0,
            buffer_count: 1,
            tiles: Vec::new(),
            leaves: Vec::new(),
            trailing: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_leaf(mut self, leaf: FixtureLeaf) -> Self {
        self.leaves.push(leaf);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, entry: FixtureMeta) -> Self {
        self.metadata.push(entry);
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: f32) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: u32) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: FixtureTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Encode the grid as it would appear at byte `base` of a file.
    ///
    /// # Panics
    ///
    /// Panics if zlib compression of an in-memory buffer fails.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn encode(&self, version: u32, base: usize) -> Vec<u8> {
        let flags = CompressionFlags::from_bits(self.compression);
        let layout = self.layout();

        let mut body = Vec::new();
        if version >= NODE_MASK_COMPRESSION {
            put_u32(&mut body, self.compression);
        }
        put_metadata(&mut body, &self.metadata);
        if version >= GRID_INSTANCING {
            self.write_transform(&mut body, version);
            self.write_topology(&mut body, &layout, version, flags);
        } else {
            self.write_topology(&mut body, &layout, version, flags);
            self.write_transform(&mut body, version);
        }
        if self.buffer_count == 1 {
            self.write_buffers(&mut body, &layout, version, flags);
        }

        let mut out = Vec::new();
        put_string(&mut out, &self.unique_name);
        put_string(&mut out, &self.grid_type);
        if version >= GRID_INSTANCING {
            put_string(&mut out, &self.instance_parent);
        }
        let grid_data_end = base + out.len() + 3 * 8;
        let block_data_end = grid_data_end + body.len();
        let file_end = block_data_end + self.trailing.len();
        put_i64(&mut out, grid_data_end as i64);
        put_i64(&mut out, block_data_end as i64);
        put_i64(&mut out, file_end as i64);
        out.extend_from_slice(&body);
        out.extend_from_slice(&self.trailing);
        out
    }

    fn layout(&self) -> Vec<(IVec3, LowerSlots<'_>)> {
        let mut uppers: Vec<(IVec3, LowerSlots<'_>)> = Vec::new();
        for leaf in &self.leaves {
            let upper_origin = leaf.origin & !((1 << UpperNode::TOTAL) - 1);
            let index = if let Some(i) = uppers.iter().position(|(o, _)| *o == upper_origin) {
                i
            } else {
                uppers.push((upper_origin, BTreeMap::new()));
                uppers.len() - 1
            };
            let lower_origin = leaf.origin & !((1 << LowerNode::TOTAL) - 1);
            uppers[index]
                .1
                .entry(UpperNode::offset_of(leaf.origin))
                .or_insert_with(|| (lower_origin, BTreeMap::new()))
                .1
                .insert(LowerNode::offset_of(leaf.origin), leaf);
        }
        uppers
    }

    fn write_transform(&self, out: &mut Vec<u8>, version: u32) {
        put_string(out, &self.transform.type_name);
        if version >= NEW_TRANSFORM {
            for v in &self.transform.vectors {
                put_dvec3(out, *v);
            }
        }
    }

    fn write_topology(
        &self,
        out: &mut Vec<u8>,
        layout: &[(IVec3, LowerSlots<'_>)],
        version: u32,
        flags: CompressionFlags,
    ) {
        put_u32(out, self.buffer_count);
        if self.buffer_count != 1 {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            put_f32(out, self.background);
            put_u32(out, self.tiles.len() as u32);
            put_u32(out, layout.len() as u32);
        }
        for &(origin, value, active) in &self.tiles {
            put_ivec3(out, origin);
            put_f32(out, value);
            out.push(u8::from(active));
        }
        for (origin, lowers) in layout {
            put_ivec3(out, *origin);
            self.write_internal(out, UpperNode::SIZE, lowers.keys(), version, flags);
            for (_, leaves) in lowers.values() {
                self.write_internal(out, LowerNode::SIZE, leaves.keys(), version, flags);
                for leaf in leaves.values() {
                    put_mask(out, &leaf.value_mask);
                }
            }
        }
    }

    /// Masks and background tiles of an internal node with no active tiles.
    fn write_internal<'s>(
        &self,
        out: &mut Vec<u8>,
        size: usize,
        child_slots: impl Iterator<Item = &'s usize>,
        version: u32,
        flags: CompressionFlags,
    ) {
        let mut child_mask = NodeMask::new(size);
        for &n in child_slots {
            child_mask.set(n, true);
        }
        put_mask(out, &child_mask);
        put_mask(out, &NodeMask::new(size));

        let stored = if version >= NODE_MASK_COMPRESSION {
            out.push(NO_MASK_OR_INACTIVE_VALS);
            if flags.active_mask { 0 } else { size }
        } else {
            child_mask.count_off()
        };
        write_data(out, flags, &vec![self.background; stored]);
    }

    fn write_buffers(
        &self,
        out: &mut Vec<u8>,
        layout: &[(IVec3, LowerSlots<'_>)],
        version: u32,
        flags: CompressionFlags,
    ) {
        let leaves = layout
            .iter()
            .flat_map(|(_, lowers)| lowers.values())
            .flat_map(|(_, leaves)| leaves.values());
        for leaf in leaves {
            put_mask(out, &leaf.value_mask);
            out.push(leaf.encoding);
            if !is_known_encoding(leaf.encoding) {
                write_data(out, flags, &leaf.values);
                continue;
            }

            let [inactive0, inactive1] = leaf.inactive.unwrap_or([self.background; 2]);
            if matches!(
                leaf.encoding,
                NO_MASK_AND_ONE_INACTIVE_VAL | MASK_AND_ONE_INACTIVE_VAL | MASK_AND_TWO_INACTIVE_VALS
            ) {
                put_f32(out, inactive0);
            }
            if leaf.encoding == MASK_AND_TWO_INACTIVE_VALS {
                put_f32(out, inactive1);
            }
            if matches!(
                leaf.encoding,
                MASK_AND_NO_INACTIVE_VALS | MASK_AND_ONE_INACTIVE_VAL | MASK_AND_TWO_INACTIVE_VALS
            ) {
                put_mask(out, &leaf.selection);
            }

            if flags.active_mask
                && leaf.encoding != NO_MASK_AND_ALL_VALS
                && version >= NODE_MASK_COMPRESSION
            {
                let active: Vec<f32> = leaf.value_mask.iter_on().map(|n| leaf.values[n]).collect();
                write_data(out, flags, &active);
            } else {
                write_data(out, flags, &leaf.values);
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn write_data(out: &mut Vec<u8>, flags: CompressionFlags, values: &[f32]) {
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    if values.is_empty() && (flags.zlib || flags.blosc) {
        put_i64(out, 0);
    } else if flags.blosc {
        put_i64(out, raw.len() as i64);
        out.extend_from_slice(&raw);
    } else if flags.zlib {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).expect("zlib into memory");
        let zipped = encoder.finish().expect("zlib into memory");
        put_i64(out, zipped.len() as i64);
        out.extend_from_slice(&zipped);
    } else {
        out.extend_from_slice(&raw);
    }
}
