//! Memory backends and the devices behind them.
//!
//! # Architecture
//!
//! ```text
//! BackendContext
//!     +-- graphics: Box<dyn DevicePrimitives>
//!     +-- compute:  Box<dyn DevicePrimitives>
//!             +-- SoftDevice  (host memory, byte budget)
//!             +-- WgpuDevice  (storage buffers, feature "wgpu")
//! ```
//!
//! Host representations need no device; graphics and compute
//! representations hold a [`DeviceBuffer`] allocated on their device.

mod device;
mod soft;
mod tracker;

#[cfg(feature = "wgpu")]
mod wgpu_device;

pub use device::{DeviceBuffer, DeviceLimits, DevicePrimitives};
pub use soft::{SoftDevice, SoftPool};
pub use tracker::{GenerationTracker, NativeId};

#[cfg(feature = "wgpu")]
pub use wgpu_device::WgpuDevice;

/// Memory space a representation lives in.
///
/// The derived order (Host < Graphics < Compute) is the tie-break order
/// used by path planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendTag {
    /// Flat array in host memory.
    Host,
    /// Graphics-API memory (textures, vertex buffers).
    Graphics,
    /// Compute-API memory objects.
    Compute,
}

impl BackendTag {
    /// All tags in tie-break order.
    pub const ALL: [BackendTag; 3] = [Self::Host, Self::Graphics, Self::Compute];

    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Graphics => "graphics",
            Self::Compute => "compute",
        }
    }
}

impl std::fmt::Display for BackendTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Device implementation used for graphics and compute memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceKind {
    /// Software device in host memory.
    #[default]
    Soft,
    /// wgpu device (Vulkan/Metal/DX12).
    Wgpu,
}

impl DeviceKind {
    /// Check if this device kind can be created on the current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Soft => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuDevice::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Wgpu => "wgpu",
        }
    }

    /// Parse from a name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "soft" | "cpu" => Some(Self::Soft),
            "wgpu" | "gpu" => Some(Self::Wgpu),
            _ => None,
        }
    }
}

/// Information about a device kind.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device kind.
    pub kind: DeviceKind,
    /// Whether it is available.
    pub available: bool,
    /// Description.
    pub description: &'static str,
}

/// Detect all device kinds compiled into this build.
pub fn detect_devices() -> Vec<DeviceInfo> {
    #[allow(unused_mut)]
    let mut devices = vec![DeviceInfo {
        kind: DeviceKind::Soft,
        available: true,
        description: "software device in host memory",
    }];

    #[cfg(feature = "wgpu")]
    devices.push(DeviceInfo {
        kind: DeviceKind::Wgpu,
        available: WgpuDevice::is_available(),
        description: "GPU storage buffers via wgpu (Vulkan/Metal/DX12)",
    });

    devices
}

/// Get description of available devices.
pub fn describe_devices() -> String {
    let mut desc = String::new();
    for info in detect_devices() {
        let status = if info.available { "+" } else { "-" };
        desc.push_str(&format!("[{}] {}: {}\n", status, info.kind.name(), info.description));
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_order() {
        assert!(BackendTag::Host < BackendTag::Graphics);
        assert!(BackendTag::Graphics < BackendTag::Compute);
        let mut tags = vec![BackendTag::Compute, BackendTag::Host, BackendTag::Graphics];
        tags.sort();
        assert_eq!(tags, BackendTag::ALL);
    }

    #[test]
    fn test_soft_always_available() {
        assert!(DeviceKind::Soft.is_available());
        assert!(describe_devices().contains("[+] soft"));
        assert_eq!(DeviceKind::from_name("WGPU"), Some(DeviceKind::Wgpu));
    }
}
