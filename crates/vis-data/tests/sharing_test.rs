//! Sharing map tests: reference counting, reinitialize hooks, stale handles.

use std::sync::{Arc, Mutex};

use vis_data::prelude::*;
use vis_data::{DevicePrimitives, ReinitPhase, SharingMap, SoftPool};

fn ctx() -> BackendContext {
    BackendContext::new(ContextConfig::default().with_budgets(1 << 20, 1 << 20)).unwrap()
}

fn ramp(n: u32) -> HostRep {
    HostRep::from_vec(1, UVec3::new(n, 1, 1), (0..n as i32).collect()).unwrap()
}

#[test]
fn test_n_acquisitions_need_n_releases() {
    let ctx = ctx();
    let gfx = GraphicsRep::upload(&ctx, &ramp(8)).unwrap();
    let id = gfx.native_id();

    let views: Vec<ComputeRep> = (0..3).map(|_| ComputeRep::shared(&ctx, &gfx).unwrap()).collect();
    assert_eq!(ctx.sharing().ref_count(id), 3);
    assert_eq!(ctx.sharing().stats().entries, 1);

    let mut views = views.into_iter();
    drop(views.next());
    drop(views.next());
    assert!(ctx.sharing().is_shared(id));

    drop(views.next());
    assert!(!ctx.sharing().is_shared(id));
    assert_eq!(ctx.sharing().stats().refs, 0);
}

#[test]
fn test_extra_release_rejected() {
    let pool = SoftPool::new();
    let gfx = pool.device("graphics", 1024);
    let cmp = pool.device("compute", 1024);
    let map = Arc::new(SharingMap::new());

    let native = gfx.upload(&[0u8; 16]).unwrap();
    let a = map.acquire(&native, &cmp).unwrap().into_raw();
    let b = map.acquire(&native, &cmp).unwrap().into_raw();
    assert_eq!(a, b);

    map.release(a).unwrap();
    assert_eq!(map.ref_count(a), 1);
    map.release(b).unwrap();
    let err = map.release(a).unwrap_err();
    assert!(err.to_string().contains("not shared"));
}

#[test]
fn test_hooks_fire_around_resize() {
    let ctx = ctx();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    ctx.sharing().on_reinitialize(move |id, phase| sink.lock().unwrap().push((id, phase)));

    let mut gfx = GraphicsRep::upload(&ctx, &ramp(4)).unwrap();
    let cmp = ComputeRep::shared(&ctx, &gfx).unwrap();
    gfx.resize(&ctx, UVec3::new(16, 1, 1)).unwrap();

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![(gfx.native_id(), ReinitPhase::Before), (gfx.native_id(), ReinitPhase::After)]
    );
    // The view was recreated against the new allocation.
    assert_eq!(cmp.read_bytes(&ctx).unwrap().len(), 64);
}

#[test]
fn test_unshared_resize_fires_no_hooks() {
    let ctx = ctx();
    let count = Arc::new(Mutex::new(0usize));
    let sink = count.clone();
    ctx.sharing().on_reinitialize(move |_, _| *sink.lock().unwrap() += 1);

    let mut gfx = GraphicsRep::upload(&ctx, &ramp(4)).unwrap();
    gfx.resize(&ctx, UVec3::new(2, 1, 1)).unwrap();
    assert_eq!(*count.lock().unwrap(), 0);
}

#[test]
fn test_alias_goes_stale_without_hooks() {
    let pool = SoftPool::new();
    let gfx = pool.device("graphics", 1024);
    let cmp = pool.device("compute", 1024);

    let mut native = gfx.upload(&[1, 2, 3, 4]).unwrap();
    let alias = cmp.alias(&native).unwrap();
    assert_eq!(cmp.read(&alias).unwrap(), vec![1, 2, 3, 4]);

    gfx.resize(&mut native, 8).unwrap();
    assert!(alias.is_stale());
    let err = cmp.read(&alias).unwrap_err();
    assert!(err.is_stale());

    drop(native);
    assert!(cmp.write(&alias, 0, &[0]).unwrap_err().is_stale());
    assert_eq!(pool.live_resources(), 0);
}

#[test]
fn test_alias_across_pools_rejected() {
    let gfx = SoftPool::new().device("graphics", 64);
    let cmp = SoftPool::new().device("compute", 64);
    let native = gfx.allocate(8).unwrap();
    assert!(!cmp.can_share_with(&gfx));
    assert!(cmp.alias(&native).is_err());
}

#[test]
fn test_shared_view_sees_owner_writes() {
    let ctx = ctx();
    let gfx = GraphicsRep::upload(&ctx, &ramp(4)).unwrap();
    let cmp = ComputeRep::shared(&ctx, &gfx).unwrap();
    cmp.set_value(&ctx, UVec3::new(1, 0, 0), 0, 77.0).unwrap();
    assert_eq!(gfx.value(&ctx, UVec3::new(1, 0, 0), 0).unwrap(), 77.0);
}
