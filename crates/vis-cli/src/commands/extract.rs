//! Sub-region extraction command.

use crate::ExtractArgs;
use anyhow::{Result, bail};
use vis_core::{BorderMode, DataFormat, ScalarType};
use vis_data::HostRep;

const MAX_PRINTED: usize = 64;

/// Runs the extract command, printing the extracted scalars.
pub fn run(args: ExtractArgs, verbose: bool) -> Result<()> {
    let extent = super::parse_uvec3(&args.extent)?;
    let offset = super::parse_ivec3(&args.offset)?;
    let size = super::parse_uvec3(&args.size)?;
    let Some(border) = BorderMode::from_name(&args.border) else {
        bail!("unknown border policy '{}' (clamp, fill)", args.border);
    };

    let ctx = super::context()?;
    let mut volume = super::ramp_volume(extent, DataFormat::scalar(ScalarType::I32))?;
    let host = volume.representation::<HostRep>(&ctx)?;
    let sub = host.sub_region(offset, size, border)?;

    println!("source {} offset {} size {} ({:?})", extent, offset, size, border);
    println!("output {}", sub.extent());

    let values = sub.as_slice::<i32>()?;
    let shown = if verbose { values.len() } else { values.len().min(MAX_PRINTED) };
    let row = sub.extent().x.max(1) as usize;
    for chunk in values[..shown].chunks(row) {
        let line: Vec<String> = chunk.iter().map(|v| format!("{:>4}", v)).collect();
        println!("{}", line.join(" "));
    }
    if shown < values.len() {
        println!("... {} more", values.len() - shown);
    }
    Ok(())
}
