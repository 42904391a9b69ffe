//! CLI command implementations

pub mod backends;
pub mod convert;
pub mod extract;
pub mod sharing;

use anyhow::{Context, Result, bail};
use glam::{IVec3, UVec3};
use tracing::debug;
use vis_core::{DataFormat, HostData};
use vis_data::{BackendContext, BackendTag, ContextConfig, HostRep, Volume, VolumeMeta};

/// Build a context from environment configuration.
pub fn context() -> Result<BackendContext> {
    let config = ContextConfig::from_env();
    debug!(?config, "context configuration");
    BackendContext::new(config).context("Failed to create backend context")
}

/// Parse `x,y,z` into three integers.
fn parse_triplet<T: std::str::FromStr>(s: &str) -> Result<[T; 3]> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("expected x,y,z, got '{}'", s);
    }
    let mut out = Vec::with_capacity(3);
    for p in parts {
        match p.parse::<T>() {
            Ok(v) => out.push(v),
            Err(_) => bail!("invalid component '{}' in '{}'", p, s),
        }
    }
    match <[T; 3]>::try_from(out) {
        Ok(arr) => Ok(arr),
        Err(_) => bail!("expected x,y,z, got '{}'", s),
    }
}

/// Parse an unsigned `x,y,z` extent or position.
pub fn parse_uvec3(s: &str) -> Result<UVec3> {
    Ok(UVec3::from_array(parse_triplet(s)?))
}

/// Parse a signed `x,y,z` offset.
pub fn parse_ivec3(s: &str) -> Result<IVec3> {
    Ok(IVec3::from_array(parse_triplet(s)?))
}

/// Parse a backend name.
pub fn parse_tag(s: &str) -> Result<BackendTag> {
    match BackendTag::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(s)) {
        Some(tag) => Ok(tag),
        None => bail!("unknown backend '{}' (host, graphics, compute)", s),
    }
}

/// Volume whose scalars count up from zero.
pub fn ramp_volume(extent: UVec3, format: DataFormat) -> Result<Volume> {
    let len = extent.x as usize * extent.y as usize * extent.z as usize * format.components();
    let mut data = HostData::zeros(format.scalar_type(), len);
    for i in 0..len {
        data.set_f64(i, i as f64);
    }
    let host = HostRep::from_data(format, extent, data)?;
    Ok(Volume::from_host(VolumeMeta::default(), host)?)
}
