//! Memory detection and budgeting.
//!
//! Budgets can be overridden per device through
//! [`ContextConfig::from_env`](crate::ContextConfig::from_env).

use std::sync::OnceLock;

/// Default device budget as a fraction of system RAM.
pub const DEFAULT_BUDGET_FRACTION: f64 = 0.25;

static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Detect total system RAM in bytes.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024) // KB to bytes
            .unwrap_or(8 * 1024 * 1024 * 1024) // 8 GB fallback
    })
}

/// Default budget of one software device.
pub fn default_budget() -> u64 {
    (system_memory() as f64 * DEFAULT_BUDGET_FRACTION) as u64
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
