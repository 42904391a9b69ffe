//! Shared fixtures for the vis-rs benchmarks.

use glam::UVec3;
use vis_data::{BackendContext, ContextConfig, DataResult, HostRep, Volume, VolumeMeta};

/// Context with budgets large enough for the benchmark volumes.
pub fn bench_context(interop: bool) -> DataResult<BackendContext> {
    let config = ContextConfig::default()
        .with_budgets(1 << 30, 1 << 30)
        .with_interop(interop);
    BackendContext::new(config)
}

/// Cubic f32 volume of side `n` holding a ramp.
pub fn ramp_host(n: u32) -> DataResult<HostRep> {
    let count = (n * n * n) as usize;
    let data: Vec<f32> = (0..count).map(|i| i as f32).collect();
    HostRep::from_vec(1, UVec3::splat(n), data)
}

/// Volume wrapping [`ramp_host`].
pub fn ramp_volume(n: u32) -> DataResult<Volume> {
    Volume::from_host(VolumeMeta::default(), ramp_host(n)?)
}
