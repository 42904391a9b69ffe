//! Converter registry and path planning.
//!
//! Converters are keyed by (data kind, source, destination). When no direct
//! converter exists, a bounded breadth-first search composes single-hop
//! converters into a [`ConverterPackage`].
//!
//! # Path Choice
//!
//! Candidates are ranked by, in order:
//!
//! 1. fewer hops
//! 2. starting from the authoritative representation
//! 3. lower source tag (Host < Graphics < Compute)
//!
//! Within one source, neighbors are expanded in tag order, so intermediate
//! hops also prefer the lower tag. Registration order never matters.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use crate::backend::BackendTag;
use crate::config::{ContextConfig, DEFAULT_MAX_HOPS, MAX_HOPS_LIMIT};
use crate::converter::{
    ComputeToGraphics, ComputeToHost, Converter, ConverterPackage, GraphicsToCompute, GraphicsToHost,
    HostToCompute, HostToGraphics,
};
use crate::data::DataKindId;
use crate::error::{DataError, DataResult};

type Key = (DataKindId, BackendTag, BackendTag);

/// Registered converters plus a cache of planned packages.
pub struct ConverterRegistry {
    converters: HashMap<Key, Arc<dyn Converter>>,
    packages: Mutex<HashMap<Key, Option<Arc<ConverterPackage>>>>,
    max_hops: usize,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOPS)
    }
}

impl ConverterRegistry {
    /// Empty registry searching at most `max_hops` hops.
    pub fn new(max_hops: usize) -> Self {
        Self {
            converters: HashMap::new(),
            packages: Mutex::new(HashMap::new()),
            max_hops: max_hops.clamp(1, MAX_HOPS_LIMIT),
        }
    }

    /// Registry with the built-in converters for every data kind.
    pub fn with_defaults(config: &ContextConfig) -> DataResult<Self> {
        let mut registry = Self::new(config.max_hops);
        registry.register_for_all(Arc::new(HostToGraphics))?;
        registry.register_for_all(Arc::new(GraphicsToHost))?;
        registry.register_for_all(Arc::new(GraphicsToCompute))?;
        registry.register_for_all(Arc::new(ComputeToGraphics))?;
        registry.register_for_all(Arc::new(ComputeToHost))?;
        if config.direct_upload {
            registry.register_for_all(Arc::new(HostToCompute))?;
        }
        Ok(registry)
    }

    /// Register `converter` for `kind`.
    ///
    /// Fails with [`DataError::DuplicateConverter`] if the (kind, source,
    /// destination) triple is taken.
    pub fn register(&mut self, kind: DataKindId, converter: Arc<dyn Converter>) -> DataResult<()> {
        let (src, dst) = (converter.source(), converter.destination());
        if self.converters.contains_key(&(kind, src, dst)) {
            return Err(DataError::DuplicateConverter { kind, src, dst });
        }
        trace!(%kind, converter = %converter.name(), "register converter");
        self.converters.insert((kind, src, dst), converter);
        self.packages
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Register `converter` for every data kind.
    pub fn register_for_all(&mut self, converter: Arc<dyn Converter>) -> DataResult<()> {
        for kind in DataKindId::ALL {
            self.register(kind, converter.clone())?;
        }
        Ok(())
    }

    /// Direct converter, if registered.
    pub fn converter(&self, kind: DataKindId, src: BackendTag, dst: BackendTag) -> Option<Arc<dyn Converter>> {
        self.converters.get(&(kind, src, dst)).cloned()
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Maximum package length.
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Change the maximum package length, clamped to `1..=8`.
    pub fn set_max_hops(&mut self, max_hops: usize) {
        self.max_hops = max_hops.clamp(1, MAX_HOPS_LIMIT);
        self.packages
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Whether some package leads from `src` to `dst`.
    pub fn supports(&self, kind: DataKindId, src: BackendTag, dst: BackendTag) -> bool {
        self.path(kind, src, dst).is_some()
    }

    /// Shortest package from `src` to `dst`, cached.
    pub fn path(&self, kind: DataKindId, src: BackendTag, dst: BackendTag) -> Option<Arc<ConverterPackage>> {
        let mut cache = self.packages.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry((kind, src, dst))
            .or_insert_with(|| {
                let pkg = self.search(kind, src, dst).map(Arc::new);
                if let Some(pkg) = &pkg {
                    debug!(%kind, path = %pkg.name(), "package built");
                }
                pkg
            })
            .clone()
    }

    /// Pick the package that brings one of `sources` to `target`.
    ///
    /// `sources` are the valid representations of a data object and
    /// `authoritative` the most recently written one.
    pub fn plan(
        &self,
        kind: DataKindId,
        sources: &[BackendTag],
        authoritative: Option<BackendTag>,
        target: BackendTag,
    ) -> DataResult<Arc<ConverterPackage>> {
        let mut best: Option<((usize, bool, BackendTag), Arc<ConverterPackage>)> = None;
        for &src in sources.iter().filter(|&&s| s != target) {
            let Some(pkg) = self.path(kind, src, target) else {
                continue;
            };
            let rank = (pkg.len(), authoritative != Some(src), src);
            if best.as_ref().is_none_or(|(r, _)| rank < *r) {
                best = Some((rank, pkg));
            }
        }
        match best {
            Some((_, pkg)) => {
                debug!(%kind, %target, path = %pkg.name(), "conversion path chosen");
                Ok(pkg)
            }
            None => {
                let mut tried = sources.to_vec();
                tried.sort();
                tried.dedup();
                Err(DataError::NoConversionPath { kind, tried, target })
            }
        }
    }

    fn search(&self, kind: DataKindId, src: BackendTag, dst: BackendTag) -> Option<ConverterPackage> {
        let mut parent: HashMap<BackendTag, (BackendTag, Arc<dyn Converter>)> = HashMap::new();
        let mut queue = VecDeque::from([(src, 0usize)]);

        while let Some((node, depth)) = queue.pop_front() {
            if node == dst {
                break;
            }
            if depth == self.max_hops {
                continue;
            }
            for next in BackendTag::ALL {
                if next == src || parent.contains_key(&next) {
                    continue;
                }
                if let Some(conv) = self.converters.get(&(kind, node, next)) {
                    parent.insert(next, (node, conv.clone()));
                    queue.push_back((next, depth + 1));
                }
            }
        }

        let mut hops = Vec::new();
        let mut cur = dst;
        while cur != src {
            let (prev, conv) = parent.get(&cur)?;
            hops.push(conv.clone());
            cur = *prev;
        }
        hops.reverse();
        ConverterPackage::new(hops).ok()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .field("max_hops", &self.max_hops)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BackendTag::*;

    fn defaults() -> ConverterRegistry {
        ConverterRegistry::with_defaults(&ContextConfig::default()).unwrap()
    }

    #[test]
    fn test_direct_path() {
        let reg = defaults();
        let pkg = reg.path(DataKindId::Volume, Host, Graphics).unwrap();
        assert_eq!(pkg.len(), 1);
    }

    #[test]
    fn test_two_hop_package() {
        let reg = defaults();
        let pkg = reg.path(DataKindId::Volume, Host, Compute).unwrap();
        assert_eq!(pkg.path(), vec![Host, Graphics, Compute]);
    }

    #[test]
    fn test_direct_upload_shortens_path() {
        let reg = ConverterRegistry::with_defaults(&ContextConfig::default().with_direct_upload(true)).unwrap();
        assert_eq!(reg.path(DataKindId::Layer, Host, Compute).unwrap().len(), 1);
    }

    #[test]
    fn test_max_hops_bounds_search() {
        let reg = ConverterRegistry::with_defaults(&ContextConfig::default().with_max_hops(1)).unwrap();
        assert!(reg.path(DataKindId::Volume, Host, Compute).is_none());
        let err = reg.plan(DataKindId::Volume, &[Host], Some(Host), Compute).unwrap_err();
        assert!(err.is_no_path());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = defaults();
        let err = reg.register(DataKindId::Buffer, Arc::new(HostToGraphics)).unwrap_err();
        assert!(matches!(err, DataError::DuplicateConverter { .. }));
    }

    #[test]
    fn test_plan_prefers_authoritative_on_tie() {
        let reg = defaults();
        // Host and Compute both reach Graphics in one hop.
        let pkg = reg.plan(DataKindId::Volume, &[Host, Compute], Some(Compute), Graphics).unwrap();
        assert_eq!(pkg.source(), Compute);
        let pkg = reg.plan(DataKindId::Volume, &[Compute, Host], None, Graphics).unwrap();
        assert_eq!(pkg.source(), Host);
    }

    #[test]
    fn test_plan_prefers_fewer_hops() {
        let reg = defaults();
        let pkg = reg.plan(DataKindId::Volume, &[Host, Graphics], Some(Host), Compute).unwrap();
        assert_eq!(pkg.source(), Graphics);
        assert_eq!(pkg.len(), 1);
    }

    #[test]
    fn test_registration_order_irrelevant() {
        let mut a = ConverterRegistry::new(3);
        a.register(DataKindId::Volume, Arc::new(ComputeToGraphics)).unwrap();
        a.register(DataKindId::Volume, Arc::new(GraphicsToCompute)).unwrap();
        a.register(DataKindId::Volume, Arc::new(HostToGraphics)).unwrap();
        a.register(DataKindId::Volume, Arc::new(ComputeToHost)).unwrap();

        let mut b = ConverterRegistry::new(3);
        b.register(DataKindId::Volume, Arc::new(ComputeToHost)).unwrap();
        b.register(DataKindId::Volume, Arc::new(HostToGraphics)).unwrap();
        b.register(DataKindId::Volume, Arc::new(GraphicsToCompute)).unwrap();
        b.register(DataKindId::Volume, Arc::new(ComputeToGraphics)).unwrap();

        for (src, dst) in [(Host, Compute), (Graphics, Host), (Compute, Host)] {
            let pa = a.path(DataKindId::Volume, src, dst).unwrap().path();
            let pb = b.path(DataKindId::Volume, src, dst).unwrap().path();
            assert_eq!(pa, pb);
        }
    }

    #[test]
    fn test_no_path_names_sources() {
        let reg = ConverterRegistry::new(3);
        let err = reg.plan(DataKindId::Buffer, &[Graphics, Host], None, Compute).unwrap_err();
        match err {
            DataError::NoConversionPath { kind, tried, target } => {
                assert_eq!(kind, DataKindId::Buffer);
                assert_eq!(tried, vec![Host, Graphics]);
                assert_eq!(target, Compute);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
