//! Conversion round trip on a ramp volume.
//!
//! Uploads a host ramp to the target backend, optionally edits one voxel
//! there, reads it back on the host and checks every element.

use std::time::Instant;

use crate::ConvertArgs;
use anyhow::{Context, Result, bail};
use glam::UVec3;
use vis_core::{DataFormat, brick::linear_index};
use vis_data::{BackendTag, ComputeRep, Converter, GraphicsRep, HostRep, Volume};

/// Parse `x,y,z=value`.
fn parse_edit(s: &str) -> Result<(UVec3, f64)> {
    let (pos, value) = s
        .split_once('=')
        .with_context(|| format!("expected x,y,z=value, got '{}'", s))?;
    let value = value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid value in '{}'", s))?;
    Ok((super::parse_uvec3(pos)?, value))
}

/// Runs the convert command.
pub fn run(args: ConvertArgs, verbose: bool) -> Result<()> {
    let extent = super::parse_uvec3(&args.extent)?;
    let format = DataFormat::parse(&args.format).with_context(|| format!("Invalid format: {}", args.format))?;
    let target = super::parse_tag(&args.target)?;
    let edit = args.edit.as_deref().map(parse_edit).transpose()?;

    let ctx = super::context()?;
    let mut volume = super::ramp_volume(extent, format)?;
    let original = volume.representation::<HostRep>(&ctx)?.clone();

    if verbose {
        println!("Volume {} {} ({} bytes)", extent, format, original.size_bytes());
        if let Some(pkg) = ctx.registry().path(vis_data::DataKindId::Volume, BackendTag::Host, target) {
            println!("Path: {}", pkg.name());
        }
    }

    let start = Instant::now();
    edit_on(&ctx, &mut volume, target, edit)?;
    let upload = start.elapsed();

    let start = Instant::now();
    let host = volume.representation::<HostRep>(&ctx)?;
    let download = start.elapsed();

    let edited = edit.map(|(pos, _)| linear_index(pos, extent) * format.components());
    let mut mismatches = 0usize;
    for i in 0..original.data().len() {
        let expected = match edit {
            Some((_, v)) if Some(i) == edited => original_with(format, v),
            _ => original.data().get_f64(i).unwrap_or_default(),
        };
        if host.data().get_f64(i) != Some(expected) {
            mismatches += 1;
        }
    }

    println!(
        "host -> {}: {:.3} ms, {} -> host: {:.3} ms",
        target,
        upload.as_secs_f64() * 1000.0,
        target,
        download.as_secs_f64() * 1000.0
    );
    println!("valid: {:?}, authoritative: {:?}", volume.valid_tags(), volume.authoritative());
    if mismatches > 0 {
        bail!("{} of {} elements differ after the round trip", mismatches, original.data().len());
    }
    println!("round trip OK ({} elements)", original.data().len());
    Ok(())
}

/// Value `v` after storage in `format`.
fn original_with(format: DataFormat, v: f64) -> f64 {
    let mut scalar = vis_core::HostData::zeros(format.scalar_type(), 1);
    scalar.set_f64(0, v);
    scalar.get_f64(0).unwrap_or_default()
}

fn edit_on(
    ctx: &vis_data::BackendContext,
    volume: &mut Volume,
    target: BackendTag,
    edit: Option<(UVec3, f64)>,
) -> Result<()> {
    match (target, edit) {
        (BackendTag::Graphics, Some((pos, v))) => {
            volume.editable_representation::<GraphicsRep>(ctx)?.set_value(ctx, pos, 0, v)?;
        }
        (BackendTag::Compute, Some((pos, v))) => {
            volume.editable_representation::<ComputeRep>(ctx)?.set_value(ctx, pos, 0, v)?;
        }
        (BackendTag::Host, Some((pos, v))) => {
            volume.editable_representation::<HostRep>(ctx)?.set_value(pos, 0, v)?;
        }
        (BackendTag::Graphics, None) => {
            volume.representation::<GraphicsRep>(ctx)?;
            volume.invalidate_all_other(BackendTag::Graphics);
        }
        (BackendTag::Compute, None) => {
            volume.representation::<ComputeRep>(ctx)?;
            volume.invalidate_all_other(BackendTag::Compute);
        }
        (BackendTag::Host, None) => {}
    }
    Ok(())
}
