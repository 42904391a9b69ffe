//! Device and context listing.

use crate::BackendsArgs;
use anyhow::Result;
use vis_data::backend::describe_devices;
use vis_data::memory::{format_bytes, system_memory};
use vis_data::{BackendContext, BackendTag, Converter, DataKindId};

/// Prints the devices compiled into this build and the state of a fresh context.
pub fn run(args: BackendsArgs, verbose: bool) -> Result<()> {
    println!("Devices:");
    for line in describe_devices().lines() {
        println!("  {}", line);
    }
    println!("System memory: {}", format_bytes(system_memory()));

    let ctx = super::context()?;
    let cfg = ctx.config();
    println!();
    println!("Context ({}):", cfg.device.name());
    println!("  max hops:      {}", cfg.max_hops);
    println!("  interop:       {}", cfg.interop);
    println!("  direct upload: {}", cfg.direct_upload);
    for line in ctx.describe().lines() {
        println!("  {}", line);
    }

    if args.paths || verbose {
        println!();
        println!("Conversion paths ({}):", DataKindId::Volume);
        for src in BackendTag::ALL {
            for dst in BackendTag::ALL.into_iter().filter(|&d| d != src) {
                println!("  {}", path_line(&ctx, src, dst));
            }
        }
    }

    Ok(())
}

fn path_line(ctx: &BackendContext, src: BackendTag, dst: BackendTag) -> String {
    match ctx.registry().path(DataKindId::Volume, src, dst) {
        Some(pkg) => format!("{:<8} -> {:<8}  {}", src, dst, pkg.name()),
        None => format!("{:<8} -> {:<8}  (none)", src, dst),
    }
}
