//! Print a JSON summary of every grid in an OpenVDB file.
//!
//! Run: `cargo run -p vdb --features tools --bin vdb_inspect -- <file.vdb> [--strict]`
//!
//! Decode warnings are logged to stderr; set `--strict` to fail on them.

use std::env;
use std::process::ExitCode;

use vdb::VdbFile;
use vdb::vdb_decode::{Codecs, DecodeOptions, Grid};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let strict = args.iter().any(|a| a == "--strict");
    let Some(path) = args.iter().find(|a| !a.starts_with("--")) else {
        eprintln!("usage: vdb_inspect <file.vdb> [--strict]");
        return ExitCode::FAILURE;
    };

    let file = match VdbFile::open_with(path, DecodeOptions { strict }, Codecs::default()) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        version = file.header().version,
        grids = file.grids().len(),
        "decoded {path}"
    );

    let summary = serde_json::json!({
        "path": path,
        "version": file.header().version,
        "library": format!("{}.{}", file.header().library_major, file.header().library_minor),
        "uuid": file.header().uuid,
        "metadata": file
            .metadata()
            .iter()
            .map(|e| (e.name.clone(), serde_json::Value::from(e.value.clone())))
            .collect::<serde_json::Map<_, _>>(),
        "grids": file.grids().iter().map(grid_summary).collect::<Vec<_>>(),
    });

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("failed to serialize summary: {e}");
            ExitCode::FAILURE
        }
    }
}

fn grid_summary(grid: &Grid) -> serde_json::Value {
    let transform = grid.transform();
    let bbox = grid.precise_world_bbox().ok().map(|b| {
        serde_json::json!({
            "min": b.min.to_array(),
            "max": b.max.to_array(),
            "size": b.size().to_array(),
        })
    });
    serde_json::json!({
        "name": grid.name(),
        "type": grid.grid_type(),
        "precision": grid.precision().type_name(),
        "background": grid.tree().background(),
        "leaves": grid.tree().leaf_count(),
        "decoded_leaves": grid.buffer_stats().decoded,
        "mask_fallback_leaves": grid.buffer_stats().mask_fallback,
        "transform": {
            "map": transform.type_name,
            "translation": transform.translation.to_array(),
            "scale": transform.scale.to_array(),
        },
        "world_bbox": bbox,
        "warnings": grid.warnings().iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}
