//! # Slice Demo
//!
//! Runs the default session through the surface and multi-slice paths and
//! prints how much geometry each payload carries.
//!
//! Pass a path to an `.obj` file to slice that mesh instead of the sphere.

use anyhow::Context;
use geoslice::mesh::MeshSource;
use geoslice::prelude::*;
use log::info;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    geoslice::init_logging();

    let manager = geoslice::default()?;
    let session = "demo";

    let mut request = ProcessRequest::params(manager.default_params());
    if let Some(path) = std::env::args().nth(1) {
        request = request.with_mesh(MeshSource::Path(PathBuf::from(path)));
    }
    let (surface, stats) = manager
        .process_with_stats(session, request)
        .context("surface run failed")?;
    report("surface", &surface);
    info!(
        "Surface run took {:.2} ms ({:.1}% of the source vertices dropped)",
        stats.total().as_secs_f64() * 1000.0,
        stats.reduction_ratio() * 100.0
    );

    let info = manager.get(session)?;
    info!("Session holds a {:?} with {} points", info.mesh_kind, info.point_count);

    // Five planes across the sphere along Y
    let params = VisualParams {
        slicing_enabled: true,
        slice_axis: SliceAxis::Y,
        slice_position: -0.33,
        slice_count: 5,
        slice_spacing: 0.165,
        ..info.params
    };
    let (slices, stats) = manager
        .process_with_stats(session, ProcessRequest::params(params))
        .context("slice run failed")?;
    report("slices", &slices);
    info!(
        "Slice run: {:.1}% reduction, surface {}",
        stats.reduction_ratio() * 100.0,
        if stats.surface_cached { "reused" } else { "extracted" }
    );

    let scratch = manager.scratch_space(session)?;
    let file = scratch.write_payload(&slices)?;
    println!("Wrote slice payload to {}", file.display());
    println!("Metrics: {:?}", manager.metrics());
    Ok(())
}

fn report(label: &str, payload: &GeometryPayload) {
    println!(
        "{:>8}: {} vertices, {} primitives, {} KiB of vertex data",
        label,
        payload.vertex_count,
        payload.primitive_count,
        payload.vertex_bytes().len() / 1024
    );
}
