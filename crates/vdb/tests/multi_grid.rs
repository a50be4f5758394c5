use glam::{DVec3, IVec3};
use vdb::{Error, MAGIC, VdbFile};
use vdb_decode::{DecodeError, DecodeOptions, DecodeWarning};
use vdb_decode::compression::{COMPRESS_ACTIVE_MASK, COMPRESS_ZIP};
use vdb_decode::fixture::{
    FixtureGrid, FixtureLeaf, FixtureMeta, FixtureTransform, put_metadata, put_u32,
};
use vdb_decode::{Codecs, MapKind};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Archive header, file metadata and grids for `version`.
fn file_bytes(version: u32, file_compressed: bool, grids: &[FixtureGrid]) -> Vec<u8> {
    let mut out = MAGIC.to_le_bytes().to_vec();
    put_u32(&mut out, version);
    put_u32(&mut out, 11);
    put_u32(&mut out, 0);
    out.push(1);
    if (220..222).contains(&version) {
        out.push(u8::from(file_compressed));
    }
    if version >= 218 {
        out.extend_from_slice(b"6b9c3a2e-0000-4000-8000-00000000cafe");
    } else {
        out.extend_from_slice(&[0x11; 16]);
    }
    put_metadata(&mut out, &[FixtureMeta::string("creator", "fixture")]);
    put_u32(&mut out, u32::try_from(grids.len()).unwrap());
    for grid in grids {
        let encoded = grid.encode(version, out.len());
        out.extend_from_slice(&encoded);
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn ramp(xyz: IVec3) -> f32 {
    (xyz.x + 10 * xyz.y + 100 * xyz.z) as f32
}

#[test]
fn decodes_every_grid_in_order() {
    init_tracing();
    let mut density = FixtureGrid::new("density")
        .with_background(0.0)
        .with_leaf(FixtureLeaf::dense(IVec3::ZERO, ramp))
        .with_metadata(FixtureMeta::vec3i("file_bbox_min", [0, 0, 0]))
        .with_metadata(FixtureMeta::vec3i("file_bbox_max", [7, 7, 7]));
    density.trailing = vec![0; 24];
    let temperature = FixtureGrid::new("temperature")
        .with_background(300.0)
        .with_compression(COMPRESS_ZIP | COMPRESS_ACTIVE_MASK)
        .with_transform(FixtureTransform::scale_translate(
            DVec3::splat(2.0),
            DVec3::new(-8.0, 0.0, 0.0),
        ))
        .with_leaf(FixtureLeaf::uniform(IVec3::new(-8, -8, -8), 310.0))
        .with_metadata(FixtureMeta::vec3i("file_bbox_min", [-8, -8, -8]))
        .with_metadata(FixtureMeta::vec3i("file_bbox_max", [-1, -1, -1]));
    let bytes = file_bytes(224, false, &[density, temperature]);

    let file = VdbFile::from_bytes(&bytes).unwrap();
    assert_eq!(file.header().version, 224);
    assert_eq!(file.metadata().value_or_undefined("creator"), "fixture");
    assert_eq!(file.grids().len(), 2);
    assert_eq!(file.warnings().count(), 0);

    let density = file.grid("density").unwrap();
    assert_eq!(density.value_at(IVec3::new(1, 2, 3)), 321.0);
    let temperature = file.grid("temperature").unwrap();
    assert!(temperature.compression().zlib);
    assert_eq!(temperature.value_at(IVec3::new(-3, -3, -3)), 310.0);
    assert_eq!(temperature.value_at(IVec3::new(3, 3, 3)), 300.0);
    assert_eq!(file.sample("density", DVec3::new(0.9, 0.1, 0.2)), Some(1.0));
    assert_eq!(file.sample("pressure", DVec3::ZERO), None);

    let bounds = file.world_bounds().unwrap();
    assert_eq!(bounds.min, DVec3::new(-24.0, -16.0, -16.0));
    assert_eq!(bounds.max, DVec3::new(7.0, 7.0, 7.0));
    assert_eq!(bounds.size(), DVec3::new(31.0, 23.0, 23.0));
}

#[test]
fn world_bounds_skip_grids_without_bbox_metadata() {
    init_tracing();
    let unbounded = FixtureGrid::new("mask").with_leaf(FixtureLeaf::uniform(IVec3::ZERO, 1.0));
    let malformed = FixtureGrid::new("velocity")
        .with_metadata(FixtureMeta::string("file_bbox_min", "0,zero,0"))
        .with_metadata(FixtureMeta::vec3i("file_bbox_max", [1, 1, 1]));
    let bounded = FixtureGrid::new("density")
        .with_leaf(FixtureLeaf::uniform(IVec3::new(8, 0, 0), 2.0))
        .with_metadata(FixtureMeta::vec3i("file_bbox_min", [8, 0, 0]))
        .with_metadata(FixtureMeta::vec3i("file_bbox_max", [15, 7, 7]));
    let bytes = file_bytes(224, false, &[unbounded, malformed, bounded]);

    let file = VdbFile::from_bytes(&bytes).unwrap();
    assert!(matches!(
        file.grid("mask").unwrap().precise_world_bbox(),
        Err(DecodeError::MissingMetadata(_))
    ));
    assert!(matches!(
        file.grid("velocity").unwrap().precise_world_bbox(),
        Err(DecodeError::InvalidMetadata { .. })
    ));
    let bounds = file.world_bounds().unwrap();
    assert_eq!(bounds.min, DVec3::new(8.0, 0.0, 0.0));
    assert_eq!(bounds.max, DVec3::new(15.0, 7.0, 7.0));

    let none = VdbFile::from_bytes(&file_bytes(224, false, &[FixtureGrid::new("mask")])).unwrap();
    assert_eq!(none.world_bounds(), None);
}

#[test]
fn older_files_inherit_file_compression() {
    init_tracing();
    let grid = FixtureGrid::new("density")
        .with_compression(COMPRESS_ZIP)
        .with_leaf(FixtureLeaf::dense(IVec3::new(16, 0, 0), ramp));
    let bytes = file_bytes(221, true, &[grid]);

    let file = VdbFile::from_bytes(&bytes).unwrap();
    let grid = &file.grids()[0];
    assert!(grid.compression().zlib);
    assert_eq!(grid.value_at(IVec3::new(17, 1, 0)), 27.0);
}

#[test]
fn legacy_files_decode_with_a_zero_transform() {
    init_tracing();
    let grid = FixtureGrid::new("density\u{1e}0")
        .with_compression(COMPRESS_ZIP)
        .with_metadata(FixtureMeta::string("name", "old"))
        .with_transform(FixtureTransform::named("ScaleTranslateMap"))
        .with_leaf(FixtureLeaf::uniform(IVec3::ZERO, 4.0));
    let bytes = file_bytes(213, true, &[grid]);

    let file = VdbFile::from_bytes(&bytes).unwrap();
    let grid = file.grid("density").unwrap();
    assert_eq!(grid.metadata_value("name"), "density");
    assert_eq!(grid.transform().kind, MapKind::Legacy);
    assert_eq!(grid.value_at(IVec3::new(3, 3, 3)), 4.0);
    assert!(matches!(
        file.warnings().collect::<Vec<_>>()[..],
        [("density", DecodeWarning::LegacyTransform { .. })]
    ));

    let strict = VdbFile::from_bytes_with(&bytes, DecodeOptions { strict: true }, Codecs::default());
    assert!(matches!(strict, Err(Error::Decode(_))));
}

#[test]
fn files_without_grid_offsets_are_rejected() {
    let mut bytes = file_bytes(224, false, &[]);
    // has-grid-offsets flag follows magic, version and library version.
    bytes[20] = 0;
    assert!(matches!(
        VdbFile::from_bytes(&bytes),
        Err(Error::MissingGridOffsets)
    ));
}

#[test]
fn truncated_grid_is_an_error() {
    let grid = FixtureGrid::new("density").with_leaf(FixtureLeaf::uniform(IVec3::ZERO, 1.0));
    let bytes = file_bytes(224, false, &[grid]);
    let result = VdbFile::from_bytes(&bytes[..bytes.len() - 100]);
    assert!(matches!(result, Err(Error::Decode(_))));
}

#[test]
fn huge_grid_count_on_short_stream_is_truncation() {
    let mut bytes = file_bytes(224, false, &[]);
    // The grid count is the last field before the (empty) grid list.
    let count_at = bytes.len() - 4;
    bytes[count_at..].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        VdbFile::from_bytes(&bytes),
        Err(Error::Decode(DecodeError::TruncatedStream { .. }))
    ));
}

#[test]
fn open_reads_from_disk() {
    let bytes = file_bytes(224, false, &[FixtureGrid::new("density")]);
    let path = std::env::temp_dir().join(format!("vdb-open-{}.vdb", std::process::id()));
    std::fs::write(&path, &bytes).unwrap();
    let file = VdbFile::open(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(file.unwrap().grids()[0].name(), "density");

    assert!(matches!(
        VdbFile::open(path.with_extension("missing")),
        Err(Error::Io(_))
    ));
}
