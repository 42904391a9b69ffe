//! Backend context: devices, converter registry and sharing map.
//!
//! Every data object operation takes a `&BackendContext`. Nothing in the
//! crate is global; two contexts never see each other's resources.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{BackendTag, DeviceKind, DevicePrimitives, SoftPool};
use crate::config::ContextConfig;
use crate::error::DataResult;
use crate::memory::format_bytes;
use crate::registry::ConverterRegistry;
use crate::sharing::SharingMap;

/// Devices and conversion state shared by a set of data objects.
pub struct BackendContext {
    config: ContextConfig,
    graphics: Box<dyn DevicePrimitives>,
    compute: Box<dyn DevicePrimitives>,
    sharing: Arc<SharingMap>,
    registry: ConverterRegistry,
}

impl BackendContext {
    /// Create the devices selected by `config` and the default converters.
    pub fn new(config: ContextConfig) -> DataResult<Self> {
        let (graphics, compute): (Box<dyn DevicePrimitives>, Box<dyn DevicePrimitives>) = match config.device {
            DeviceKind::Soft => {
                let pool = SoftPool::new();
                (
                    Box::new(pool.device("graphics", config.graphics_budget)),
                    Box::new(pool.device("compute", config.compute_budget)),
                )
            }
            #[cfg(feature = "wgpu")]
            DeviceKind::Wgpu => {
                let gfx = crate::backend::WgpuDevice::new("graphics", config.graphics_budget)?;
                let cmp = gfx.share("compute", config.compute_budget);
                (Box::new(gfx), Box::new(cmp))
            }
            #[cfg(not(feature = "wgpu"))]
            DeviceKind::Wgpu => {
                return Err(crate::error::DataError::BackendNotAvailable(
                    "wgpu support not compiled in (enable feature \"wgpu\")".into(),
                ));
            }
        };
        Self::with_devices(config, graphics, compute)
    }

    /// Context over caller-provided devices.
    pub fn with_devices(
        config: ContextConfig,
        graphics: Box<dyn DevicePrimitives>,
        compute: Box<dyn DevicePrimitives>,
    ) -> DataResult<Self> {
        let registry = ConverterRegistry::with_defaults(&config)?;
        info!(
            graphics = graphics.name(),
            compute = compute.name(),
            interop = config.interop && compute.can_share_with(graphics.as_ref()),
            "backend context ready"
        );
        debug!(converters = registry.len(), max_hops = registry.max_hops(), "converter registry");
        Ok(Self {
            config,
            graphics,
            compute,
            sharing: Arc::new(SharingMap::new()),
            registry,
        })
    }

    /// Configuration the context was built from.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Graphics device.
    pub fn graphics(&self) -> &dyn DevicePrimitives {
        self.graphics.as_ref()
    }

    /// Compute device.
    pub fn compute(&self) -> &dyn DevicePrimitives {
        self.compute.as_ref()
    }

    /// Device serving `tag`, `None` for host memory.
    pub fn device(&self, tag: BackendTag) -> Option<&dyn DevicePrimitives> {
        match tag {
            BackendTag::Host => None,
            BackendTag::Graphics => Some(self.graphics()),
            BackendTag::Compute => Some(self.compute()),
        }
    }

    /// Sharing map of this context.
    pub fn sharing(&self) -> &Arc<SharingMap> {
        &self.sharing
    }

    /// Converter registry.
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Mutable converter registry, for registering custom converters.
    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    /// Multi-line summary of devices, memory and sharing.
    pub fn describe(&self) -> String {
        let mut desc = String::new();
        for dev in [self.graphics(), self.compute()] {
            desc.push_str(&format!(
                "{} ({}): {} / {} used\n",
                dev.name(),
                dev.kind().name(),
                format_bytes(dev.memory_used()),
                format_bytes(dev.limits().budget),
            ));
        }
        let stats = self.sharing.stats();
        desc.push_str(&format!(
            "sharing: {} entries, {} refs\nconverters: {} (max {} hops)\n",
            stats.entries,
            stats.refs,
            self.registry.len(),
            self.registry.max_hops(),
        ));
        desc
    }
}

impl std::fmt::Debug for BackendContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendContext")
            .field("graphics", &self.graphics.name())
            .field("compute", &self.compute.name())
            .field("sharing", &self.sharing)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;

    #[test]
    fn test_soft_context_shares() {
        let ctx = BackendContext::new(ContextConfig::default().with_budgets(1024, 1024)).unwrap();
        assert!(ctx.compute().can_share_with(ctx.graphics()));
        assert!(ctx.device(BackendTag::Host).is_none());
        assert_eq!(ctx.device(BackendTag::Compute).unwrap().name(), "compute");
        assert!(ctx.describe().contains("graphics (soft)"));
    }

    #[test]
    fn test_separate_pools_do_not_share() {
        let gfx = SoftPool::new().device("g", 1024);
        let cmp = SoftPool::new().device("c", 1024);
        let ctx = BackendContext::with_devices(ContextConfig::default(), Box::new(gfx), Box::new(cmp)).unwrap();
        assert!(!ctx.compute().can_share_with(ctx.graphics()));
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_wgpu_unavailable_without_feature() {
        let err = BackendContext::new(ContextConfig::default().with_device(DeviceKind::Wgpu)).unwrap_err();
        assert!(matches!(err, DataError::BackendNotAvailable(_)));
    }
}
