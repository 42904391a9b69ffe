//! Sharing map statistics command.
//!
//! Materializes compute representations of several volumes. With interop
//! enabled each one is a shared view of the graphics buffer, so the
//! sharing map holds one entry per volume.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::SharingArgs;
use anyhow::Result;
use vis_core::{DataFormat, ScalarType};
use vis_data::memory::format_bytes;
use vis_data::{ComputeRep, GraphicsRep};

/// Runs the sharing command.
pub fn run(args: SharingArgs, verbose: bool) -> Result<()> {
    let extent = super::parse_uvec3(&args.extent)?;
    let ctx = super::context()?;

    let reinits = Arc::new(AtomicUsize::new(0));
    let counter = reinits.clone();
    ctx.sharing().on_reinitialize(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let mut volumes = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let mut volume = super::ramp_volume(extent, DataFormat::scalar(ScalarType::F32))?;
        let shared = volume.representation::<ComputeRep>(&ctx)?.is_shared();
        if verbose {
            let id = volume.representation::<GraphicsRep>(&ctx)?.native_id();
            println!("{}: shared = {}, refs = {}", id, shared, ctx.sharing().ref_count(id));
        }
        volumes.push(volume);
    }

    let stats = ctx.sharing().stats();
    println!("volumes:  {}", volumes.len());
    println!("entries:  {}", stats.entries);
    println!("refs:     {}", stats.refs);
    println!("graphics: {}", format_bytes(ctx.graphics().memory_used()));
    println!("compute:  {}", format_bytes(ctx.compute().memory_used()));

    // Resizing a shared graphics buffer fires the reinitialize hooks.
    if let Some(volume) = volumes.first_mut() {
        let doubled = extent * glam::UVec3::new(2, 1, 1);
        volume
            .editable_representation::<GraphicsRep>(&ctx)?
            .resize(&ctx, doubled)?;
        println!("reinitialize events after one resize: {}", reinits.load(Ordering::Relaxed));
        volume.clear_representations();
    }

    drop(volumes);
    let stats = ctx.sharing().stats();
    println!("after drop: {} entries, {} refs", stats.entries, stats.refs);
    Ok(())
}
