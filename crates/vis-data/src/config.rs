//! Backend context configuration.
//!
//! # Environment Variables
//!
//! - `VIS_MAX_HOPS` - maximum converter package length (1-8, default 3)
//! - `VIS_INTEROP` - graphics/compute sharing ("0" or "false" disables)
//! - `VIS_DIRECT_UPLOAD` - register a direct host to compute converter
//! - `VIS_GFX_MEM_MB` - graphics device budget in megabytes
//! - `VIS_COMPUTE_MEM_MB` - compute device budget in megabytes
//! - `VIS_BACKEND` - device implementation (`soft` or `wgpu`)

use std::env;

use tracing::warn;

use crate::backend::DeviceKind;
use crate::memory::default_budget;

/// Default maximum number of hops in a converter package.
pub const DEFAULT_MAX_HOPS: usize = 3;

/// Upper bound accepted for `max_hops`.
pub const MAX_HOPS_LIMIT: usize = 8;

/// Configuration of a [`crate::BackendContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Maximum number of single-hop converters in a package.
    pub max_hops: usize,
    /// Share graphics memory with the compute device when both support it.
    pub interop: bool,
    /// Register a direct host to compute converter.
    pub direct_upload: bool,
    /// Graphics device budget in bytes.
    pub graphics_budget: u64,
    /// Compute device budget in bytes.
    pub compute_budget: u64,
    /// Device implementation.
    pub device: DeviceKind,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            interop: true,
            direct_upload: false,
            graphics_budget: default_budget(),
            compute_budget: default_budget(),
            device: DeviceKind::Soft,
        }
    }
}

impl ContextConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(hops) = lookup("VIS_MAX_HOPS").and_then(|v| v.parse::<usize>().ok()) {
            if (1..=MAX_HOPS_LIMIT).contains(&hops) {
                cfg.max_hops = hops;
            } else {
                warn!(hops, "VIS_MAX_HOPS out of range 1..=8, keeping default");
            }
        }
        if let Some(v) = lookup("VIS_INTEROP") {
            cfg.interop = parse_flag(&v);
        }
        if let Some(v) = lookup("VIS_DIRECT_UPLOAD") {
            cfg.direct_upload = parse_flag(&v);
        }
        if let Some(mb) = lookup("VIS_GFX_MEM_MB").and_then(|v| v.parse::<u64>().ok()) {
            cfg.graphics_budget = mb * 1024 * 1024;
        }
        if let Some(mb) = lookup("VIS_COMPUTE_MEM_MB").and_then(|v| v.parse::<u64>().ok()) {
            cfg.compute_budget = mb * 1024 * 1024;
        }
        if let Some(v) = lookup("VIS_BACKEND") {
            match DeviceKind::from_name(&v) {
                Some(kind) => cfg.device = kind,
                None => warn!(backend = %v, "unknown VIS_BACKEND, keeping soft"),
            }
        }
        cfg
    }

    /// Set the maximum package length, clamped to `1..=8`.
    pub fn with_max_hops(mut self, hops: usize) -> Self {
        self.max_hops = hops.clamp(1, MAX_HOPS_LIMIT);
        self
    }

    /// Enable or disable graphics/compute sharing.
    pub fn with_interop(mut self, interop: bool) -> Self {
        self.interop = interop;
        self
    }

    /// Enable or disable the direct host to compute converter.
    pub fn with_direct_upload(mut self, direct: bool) -> Self {
        self.direct_upload = direct;
        self
    }

    /// Set both device budgets in bytes.
    pub fn with_budgets(mut self, graphics: u64, compute: u64) -> Self {
        self.graphics_budget = graphics;
        self.compute_budget = compute;
        self
    }

    /// Set the device implementation.
    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.device = device;
        self
    }
}

fn parse_flag(v: &str) -> bool {
    !(v == "0" || v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("off"))
}
