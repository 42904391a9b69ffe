//! Pairwise converters between backends and multi-hop packages.
//!
//! A [`Converter`] materializes (`create_from`) or refreshes (`update`) a
//! destination representation from a source representation. Converters are
//! stateless and hold no reference to any data object; everything they need
//! comes from the [`BackendContext`] passed in.
//!
//! # Default Converters
//!
//! ```text
//! Host ──────► Graphics   upload
//! Graphics ──► Host       download
//! Graphics ──► Compute    shared view when interop is on, copy otherwise
//! Compute ───► Graphics   no-op when both alias one resource, copy otherwise
//! Compute ───► Host       download
//! Host ──────► Compute    direct upload, only when configured
//! ```
//!
//! Without the direct converter, host to compute is served by the package
//! Host -> Graphics -> Compute.

use std::sync::Arc;

use tracing::trace;

use crate::backend::BackendTag;
use crate::context::BackendContext;
use crate::error::{DataError, DataResult};
use crate::representation::{BackendRep, ComputeRep, GraphicsRep, HostRep, Representation};

/// Materializes and refreshes one backend from another.
pub trait Converter: Send + Sync {
    /// Backend read from.
    fn source(&self) -> BackendTag;

    /// Backend written to.
    fn destination(&self) -> BackendTag;

    /// Allocate and fill a new destination from `src`.
    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation>;

    /// Refresh an existing destination in place, resizing first if needed.
    ///
    /// Calling it twice in a row leaves `dst` unchanged.
    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()>;

    /// Display name, e.g. `host->graphics`.
    fn name(&self) -> String {
        format!("{}->{}", self.source(), self.destination())
    }
}

fn interop(ctx: &BackendContext) -> bool {
    ctx.config().interop && ctx.compute().can_share_with(ctx.graphics())
}

fn refresh_host(host: &mut HostRep, src_extent: glam::UVec3, src_format: vis_core::DataFormat, bytes: &[u8]) -> DataResult<()> {
    if host.format() != src_format {
        return Err(DataError::type_mismatch(src_format, host.format()));
    }
    if host.extent() != src_extent {
        host.resize(src_extent);
    }
    host.copy_from_bytes(bytes)
}

// =============================================================================
// Host <-> Graphics
// =============================================================================

/// Uploads host arrays to the graphics device.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostToGraphics;

impl Converter for HostToGraphics {
    fn source(&self) -> BackendTag {
        BackendTag::Host
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Graphics
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let host = HostRep::expect(src)?;
        Ok(GraphicsRep::upload(ctx, host)?.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let host = HostRep::expect(src)?;
        let gfx = GraphicsRep::expect_mut(dst)?;
        if gfx.extent() != host.extent() {
            gfx.resize(ctx, host.extent())?;
        }
        gfx.write_host(ctx, host)
    }
}

/// Downloads graphics arrays to host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicsToHost;

impl Converter for GraphicsToHost {
    fn source(&self) -> BackendTag {
        BackendTag::Graphics
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Host
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let gfx = GraphicsRep::expect(src)?;
        Ok(gfx.download(ctx)?.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let gfx = GraphicsRep::expect(src)?;
        let host = HostRep::expect_mut(dst)?;
        let bytes = ctx.graphics().read(gfx.buffer())?;
        refresh_host(host, gfx.extent(), gfx.format(), &bytes)
    }
}

// =============================================================================
// Graphics <-> Compute
// =============================================================================

/// Exposes graphics arrays to the compute device.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicsToCompute;

impl Converter for GraphicsToCompute {
    fn source(&self) -> BackendTag {
        BackendTag::Graphics
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Compute
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let gfx = GraphicsRep::expect(src)?;
        if interop(ctx) {
            return Ok(ComputeRep::shared(ctx, gfx)?.into());
        }
        let cmp = ComputeRep::new(ctx, gfx.format(), gfx.extent())?;
        cmp.write_bytes(ctx, &ctx.graphics().read(gfx.buffer())?)?;
        Ok(cmp.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let gfx = GraphicsRep::expect(src)?;
        let cmp = ComputeRep::expect_mut(dst)?;

        let aliased = cmp.is_shared() && cmp.native_id() == gfx.native_id() && cmp.extent() == gfx.extent();
        if aliased && cmp.is_current() {
            trace!(id = %gfx.native_id(), "graphics->compute: shared, nothing to copy");
            return Ok(());
        }
        if interop(ctx) {
            *cmp = ComputeRep::shared(ctx, gfx)?;
            return Ok(());
        }
        if cmp.extent() != gfx.extent() || cmp.is_shared() {
            cmp.resize(ctx, gfx.extent())?;
        }
        cmp.write_bytes(ctx, &ctx.graphics().read(gfx.buffer())?)
    }
}

/// Copies compute arrays back to the graphics device.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeToGraphics;

impl Converter for ComputeToGraphics {
    fn source(&self) -> BackendTag {
        BackendTag::Compute
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Graphics
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let cmp = ComputeRep::expect(src)?;
        let bytes = cmp.with_layout(|b| ctx.compute().read(b))?;
        let gfx = GraphicsRep::new(ctx, cmp.format(), cmp.extent())?;
        gfx.write_bytes(ctx, &bytes)?;
        Ok(gfx.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let cmp = ComputeRep::expect(src)?;
        let gfx = GraphicsRep::expect_mut(dst)?;
        if cmp.is_shared() && cmp.native_id() == gfx.native_id() {
            // Same physical memory; only make sure the view is still valid.
            return cmp.with_layout(|_| Ok(()));
        }
        let bytes = cmp.with_layout(|b| ctx.compute().read(b))?;
        if gfx.extent() != cmp.extent() {
            gfx.resize(ctx, cmp.extent())?;
        }
        gfx.write_bytes(ctx, &bytes)
    }
}

// =============================================================================
// Host <-> Compute
// =============================================================================

/// Downloads compute arrays to host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeToHost;

impl Converter for ComputeToHost {
    fn source(&self) -> BackendTag {
        BackendTag::Compute
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Host
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let cmp = ComputeRep::expect(src)?;
        Ok(cmp.download(ctx)?.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let cmp = ComputeRep::expect(src)?;
        let host = HostRep::expect_mut(dst)?;
        let bytes = cmp.with_layout(|b| ctx.compute().read(b))?;
        refresh_host(host, cmp.extent(), cmp.format(), &bytes)
    }
}

/// Uploads host arrays straight to the compute device.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostToCompute;

impl Converter for HostToCompute {
    fn source(&self) -> BackendTag {
        BackendTag::Host
    }

    fn destination(&self) -> BackendTag {
        BackendTag::Compute
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let host = HostRep::expect(src)?;
        Ok(ComputeRep::upload(ctx, host)?.into())
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let host = HostRep::expect(src)?;
        let cmp = ComputeRep::expect_mut(dst)?;
        if cmp.extent() != host.extent() {
            cmp.resize(ctx, host.extent())?;
        }
        cmp.write_host(ctx, host)
    }
}

// =============================================================================
// ConverterPackage
// =============================================================================

/// Give `rep` its own memory if it views `intermediate`, which a package
/// drops once the next hop ran.
fn detach_from(ctx: &BackendContext, rep: &mut Representation, intermediate: &Representation) -> DataResult<()> {
    if let (Representation::Compute(cmp), Representation::Graphics(gfx)) = (rep, intermediate) {
        if cmp.is_shared() && cmp.native_id() == gfx.native_id() {
            cmp.detach(ctx)?;
        }
    }
    Ok(())
}

/// Ordered chain of single-hop converters used as one converter.
#[derive(Clone)]
pub struct ConverterPackage {
    hops: Vec<Arc<dyn Converter>>,
}

impl ConverterPackage {
    /// Build a package, checking that every hop starts where the previous ended.
    pub fn new(hops: Vec<Arc<dyn Converter>>) -> DataResult<Self> {
        if hops.is_empty() {
            return Err(DataError::device("converter package needs at least one hop"));
        }
        for pair in hops.windows(2) {
            if pair[0].destination() != pair[1].source() {
                return Err(DataError::type_mismatch(pair[0].destination(), pair[1].source()));
            }
        }
        Ok(Self { hops })
    }

    /// Single-hop converters in execution order.
    pub fn hops(&self) -> &[Arc<dyn Converter>] {
        &self.hops
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Always `false`; packages have at least one hop.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Backends visited, source first.
    pub fn path(&self) -> Vec<BackendTag> {
        std::iter::once(self.source())
            .chain(self.hops.iter().map(|h| h.destination()))
            .collect()
    }
}

impl Converter for ConverterPackage {
    fn source(&self) -> BackendTag {
        self.hops[0].source()
    }

    fn destination(&self) -> BackendTag {
        self.hops[self.hops.len() - 1].destination()
    }

    fn create_from(&self, ctx: &BackendContext, src: &Representation) -> DataResult<Representation> {
        let mut cur = self.hops[0].create_from(ctx, src)?;
        for hop in &self.hops[1..] {
            let mut next = hop.create_from(ctx, &cur)?;
            detach_from(ctx, &mut next, &cur)?;
            cur = next;
        }
        Ok(cur)
    }

    fn update(&self, ctx: &BackendContext, src: &Representation, dst: &mut Representation) -> DataResult<()> {
        let (last, init) = match self.hops.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };
        match init.split_first() {
            None => last.update(ctx, src, dst),
            Some((first, middle)) => {
                let mut cur = first.create_from(ctx, src)?;
                for hop in middle {
                    let mut next = hop.create_from(ctx, &cur)?;
                    detach_from(ctx, &mut next, &cur)?;
                    cur = next;
                }
                last.update(ctx, &cur, dst)?;
                detach_from(ctx, dst, &cur)
            }
        }
    }

    fn name(&self) -> String {
        self.path()
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join("->")
    }
}

impl std::fmt::Debug for ConverterPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConverterPackage({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use glam::UVec3;

    fn ctx(interop: bool) -> BackendContext {
        let cfg = ContextConfig::default()
            .with_budgets(1 << 20, 1 << 20)
            .with_interop(interop);
        BackendContext::new(cfg).unwrap()
    }

    fn host() -> Representation {
        HostRep::from_vec(1, UVec3::new(4, 2, 1), (0..8u16).collect())
            .unwrap()
            .into()
    }

    #[test]
    fn test_wrong_source_variant() {
        let ctx = ctx(true);
        let err = GraphicsToHost.create_from(&ctx, &host()).unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_update_is_idempotent() {
        let ctx = ctx(true);
        let src = host();
        let mut dst = HostToGraphics.create_from(&ctx, &src).unwrap();
        HostToGraphics.update(&ctx, &src, &mut dst).unwrap();
        let first = GraphicsToHost.create_from(&ctx, &dst).unwrap();
        HostToGraphics.update(&ctx, &src, &mut dst).unwrap();
        let second = GraphicsToHost.create_from(&ctx, &dst).unwrap();
        assert_eq!(HostRep::expect(&first).unwrap(), HostRep::expect(&second).unwrap());
    }

    #[test]
    fn test_update_resizes_destination() {
        let ctx = ctx(true);
        let small: Representation = HostRep::from_vec(1, UVec3::new(2, 1, 1), vec![1u16, 2]).unwrap().into();
        let mut gfx = HostToGraphics.create_from(&ctx, &small).unwrap();
        let id = GraphicsRep::expect(&gfx).unwrap().native_id();
        HostToGraphics.update(&ctx, &host(), &mut gfx).unwrap();
        let g = GraphicsRep::expect(&gfx).unwrap();
        assert_eq!(g.extent(), UVec3::new(4, 2, 1));
        assert_eq!(g.native_id(), id);
    }

    #[test]
    fn test_graphics_to_compute_shares_with_interop() {
        let ctx = ctx(true);
        let gfx = HostToGraphics.create_from(&ctx, &host()).unwrap();
        let cmp = GraphicsToCompute.create_from(&ctx, &gfx).unwrap();
        assert!(ComputeRep::expect(&cmp).unwrap().is_shared());
    }

    #[test]
    fn test_graphics_to_compute_copies_without_interop() {
        let ctx = ctx(false);
        let gfx = HostToGraphics.create_from(&ctx, &host()).unwrap();
        let cmp = GraphicsToCompute.create_from(&ctx, &gfx).unwrap();
        let cmp_rep = ComputeRep::expect(&cmp).unwrap();
        assert!(!cmp_rep.is_shared());
        let back = ComputeToHost.create_from(&ctx, &cmp).unwrap();
        assert_eq!(HostRep::expect(&back).unwrap().as_slice::<u16>().unwrap()[7], 7);
    }

    #[test]
    fn test_package_chains_hops() {
        let ctx = ctx(false);
        let pkg = ConverterPackage::new(vec![Arc::new(HostToGraphics), Arc::new(GraphicsToCompute)]).unwrap();
        assert_eq!(pkg.name(), "host->graphics->compute");
        assert_eq!(pkg.path(), vec![BackendTag::Host, BackendTag::Graphics, BackendTag::Compute]);
        let cmp = pkg.create_from(&ctx, &host()).unwrap();
        assert_eq!(cmp.tag(), BackendTag::Compute);
        let back = ComputeToHost.create_from(&ctx, &cmp).unwrap();
        assert_eq!(HostRep::expect(&back).unwrap(), HostRep::expect(&host()).unwrap());
    }

    #[test]
    fn test_package_with_interop_returns_usable_array() {
        let ctx = ctx(true);
        let pkg = ConverterPackage::new(vec![Arc::new(HostToGraphics), Arc::new(GraphicsToCompute)]).unwrap();
        let cmp = pkg.create_from(&ctx, &host()).unwrap();

        let cmp_rep = ComputeRep::expect(&cmp).unwrap();
        assert!(!cmp_rep.is_shared());
        assert_eq!(cmp_rep.read_bytes(&ctx).unwrap().len(), 16);
        assert_eq!(ctx.sharing().stats().entries, 0);
        let back = ComputeToHost.create_from(&ctx, &cmp).unwrap();
        assert_eq!(HostRep::expect(&back).unwrap(), HostRep::expect(&host()).unwrap());
    }

    #[test]
    fn test_package_update_with_interop_keeps_destination_valid() {
        let ctx = ctx(true);
        let pkg = ConverterPackage::new(vec![Arc::new(HostToGraphics), Arc::new(GraphicsToCompute)]).unwrap();
        let mut cmp: Representation = ComputeRep::new(&ctx, host().format(), UVec3::new(4, 2, 1)).unwrap().into();
        pkg.update(&ctx, &host(), &mut cmp).unwrap();

        let cmp_rep = ComputeRep::expect(&cmp).unwrap();
        assert!(!cmp_rep.is_shared());
        assert_eq!(cmp_rep.value(&ctx, UVec3::new(3, 1, 0), 0).unwrap(), 7.0);
    }

    #[test]
    fn test_graphics_to_compute_resyncs_after_resize() {
        let ctx = ctx(true);
        let src = host();
        let mut gfx = HostToGraphics.create_from(&ctx, &src).unwrap();
        let mut cmp = GraphicsToCompute.create_from(&ctx, &gfx).unwrap();

        let small: Representation = HostRep::from_vec(1, UVec3::new(2, 1, 1), vec![5u16, 6]).unwrap().into();
        HostToGraphics.update(&ctx, &small, &mut gfx).unwrap();
        assert!(!ComputeRep::expect(&cmp).unwrap().is_current());

        GraphicsToCompute.update(&ctx, &gfx, &mut cmp).unwrap();
        let cmp_rep = ComputeRep::expect(&cmp).unwrap();
        assert!(cmp_rep.is_current());
        assert_eq!(cmp_rep.extent(), UVec3::new(2, 1, 1));
        assert_eq!(cmp_rep.value(&ctx, UVec3::new(1, 0, 0), 0).unwrap(), 6.0);
    }

    #[test]
    fn test_package_rejects_broken_chain() {
        let err = ConverterPackage::new(vec![Arc::new(HostToGraphics), Arc::new(ComputeToHost)]).unwrap_err();
        assert!(err.is_type_error());
    }
}
