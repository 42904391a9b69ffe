//! vis - multi-backend data conversion CLI
//!
//! Exercises data objects, converters and the sharing map on synthetic
//! volumes.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "vis")]
#[command(author, version, about = "Multi-backend visualization data CLI")]
#[command(long_about = "
Drives vis-data on synthetic ramp volumes.

Examples:
  vis backends                               # List devices and context state
  vis convert -e 64,64,64 -t compute         # Host -> compute -> host round trip
  vis convert -t graphics --edit 1,1,1=999   # Edit through graphics, read back on host
  vis extract -e 3,3,3 -o 1,0,0 -s 2,2,2     # Sub-region with clamped border
  vis extract -o -1,0,0 -s 4,2,1 --border fill
  vis sharing -n 8                           # Shared compute views and ref counts

Environment: VIS_MAX_HOPS, VIS_INTEROP, VIS_DIRECT_UPLOAD, VIS_GFX_MEM_MB,
VIS_COMPUTE_MEM_MB, VIS_BACKEND, RUST_LOG.
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available devices and context configuration
    #[command(visible_alias = "b")]
    Backends(BackendsArgs),

    /// Convert a ramp volume between backends and verify it
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Extract a sub-region of a ramp volume
    #[command(visible_alias = "x")]
    Extract(ExtractArgs),

    /// Materialize shared compute views and print sharing statistics
    #[command(visible_alias = "s")]
    Sharing(SharingArgs),
}

#[derive(Args)]
struct BackendsArgs {
    /// Also print the converter paths for every backend pair
    #[arg(short, long)]
    paths: bool,
}

#[derive(Args)]
struct ConvertArgs {
    /// Volume extent as x,y,z
    #[arg(short, long, default_value = "4,4,4")]
    extent: String,

    /// Element format (e.g. f32, u8x4, i16x2)
    #[arg(short, long, default_value = "f32")]
    format: String,

    /// Target backend (graphics, compute)
    #[arg(short, long, default_value = "compute")]
    target: String,

    /// Edit one voxel on the target before reading back (x,y,z=value)
    #[arg(long)]
    edit: Option<String>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Volume extent as x,y,z
    #[arg(short, long, default_value = "3,3,3")]
    extent: String,

    /// Region offset as x,y,z (may be negative)
    #[arg(short, long, default_value = "0,0,0", allow_hyphen_values = true)]
    offset: String,

    /// Region size as x,y,z (0 = full frame)
    #[arg(short, long, default_value = "2,2,2")]
    size: String,

    /// Border policy (clamp, fill)
    #[arg(short, long, default_value = "clamp")]
    border: String,
}

#[derive(Args)]
struct SharingArgs {
    /// Number of volumes
    #[arg(short = 'n', long, default_value = "4")]
    count: usize,

    /// Volume extent as x,y,z
    #[arg(short, long, default_value = "32,32,32")]
    extent: String,
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(if verbose { "debug" } else { "warn" }),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Backends(args) => commands::backends::run(args, cli.verbose),
        Commands::Convert(args) => commands::convert::run(args, cli.verbose),
        Commands::Extract(args) => commands::extract::run(args, cli.verbose),
        Commands::Sharing(args) => commands::sharing::run(args, cli.verbose),
    }
}
