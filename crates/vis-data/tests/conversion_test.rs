//! Lazy conversion tests for vis-data data objects.

use approx::assert_relative_eq;
use vis_data::prelude::*;
use vis_data::{DataError, Layer, LayerMeta, Representation};

fn ctx_with(config: ContextConfig) -> BackendContext {
    BackendContext::new(config.with_budgets(1 << 20, 1 << 20)).unwrap()
}

fn ctx() -> BackendContext {
    ctx_with(ContextConfig::default())
}

/// 4x4x4 volume holding 0..63.
fn ramp_volume() -> Volume {
    let host = HostRep::from_vec(1, UVec3::splat(4), (0..64).map(|v| v as f32).collect()).unwrap();
    Volume::from_host(VolumeMeta::default(), host).unwrap()
}

#[test]
fn test_edit_through_graphics_reaches_host() {
    let ctx = ctx();
    let mut volume = ramp_volume();

    volume.representation::<GraphicsRep>(&ctx).unwrap();
    let gfx = volume.editable_representation::<GraphicsRep>(&ctx).unwrap();
    gfx.set_value(&ctx, UVec3::new(1, 1, 1), 0, 999.0).unwrap();

    assert!(!volume.is_valid(BackendTag::Host));
    let host = volume.representation::<HostRep>(&ctx).unwrap();
    let values = host.as_slice::<f32>().unwrap();
    for (i, v) in values.iter().enumerate() {
        if i == 21 {
            assert_relative_eq!(*v, 999.0);
        } else {
            assert_relative_eq!(*v, i as f32);
        }
    }
}

#[test]
fn test_round_trip_through_every_backend() {
    for interop in [true, false] {
        let ctx = ctx_with(ContextConfig::default().with_interop(interop));
        let mut volume = ramp_volume();
        let original = volume.representation::<HostRep>(&ctx).unwrap().clone();

        volume.representation::<ComputeRep>(&ctx).unwrap();
        volume.editable_representation::<ComputeRep>(&ctx).unwrap();
        let host = volume.representation::<HostRep>(&ctx).unwrap();
        assert_eq!(host, &original, "interop = {interop}");
    }
}

#[test]
fn test_compute_edit_visible_in_graphics() {
    for interop in [true, false] {
        let ctx = ctx_with(ContextConfig::default().with_interop(interop));
        let mut volume = ramp_volume();

        let cmp = volume.editable_representation::<ComputeRep>(&ctx).unwrap();
        assert_eq!(cmp.is_shared(), interop);
        cmp.set_value(&ctx, UVec3::ZERO, 0, -5.0).unwrap();

        assert_eq!(volume.valid_tags(), vec![BackendTag::Compute]);
        let gfx = volume.representation::<GraphicsRep>(&ctx).unwrap();
        assert_relative_eq!(gfx.value(&ctx, UVec3::ZERO, 0).unwrap(), -5.0);
        assert_eq!(volume.authoritative(), Some(BackendTag::Compute));
    }
}

#[test]
fn test_stale_host_is_updated_in_place() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    let before = volume.representation::<HostRep>(&ctx).unwrap().data().as_bytes().as_ptr();

    let gfx = volume.editable_representation::<GraphicsRep>(&ctx).unwrap();
    gfx.set_value(&ctx, UVec3::new(3, 0, 0), 0, 1.5).unwrap();

    let host = volume.representation::<HostRep>(&ctx).unwrap();
    assert_eq!(host.data().as_bytes().as_ptr(), before);
    assert_eq!(host.value(UVec3::new(3, 0, 0), 0), Some(1.5));
}

#[test]
fn test_repeated_reads_are_stable() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    let first = volume.representation::<GraphicsRep>(&ctx).unwrap().native_id();
    let second = volume.representation::<GraphicsRep>(&ctx).unwrap().native_id();
    assert_eq!(first, second);
    assert_eq!(volume.authoritative(), Some(BackendTag::Host));
}

#[test]
fn test_no_path_is_an_error() {
    let ctx = ctx_with(ContextConfig::default().with_max_hops(1));
    let mut volume = ramp_volume();
    let err = volume.representation::<ComputeRep>(&ctx).unwrap_err();
    match err {
        DataError::NoConversionPath { kind, tried, target } => {
            assert_eq!(kind, DataKindId::Volume);
            assert_eq!(tried, vec![BackendTag::Host]);
            assert_eq!(target, BackendTag::Compute);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!volume.has_representation::<ComputeRep>());
    assert!(volume.is_valid(BackendTag::Host));
}

#[test]
fn test_direct_upload_skips_graphics() {
    let ctx = ctx_with(ContextConfig::default().with_max_hops(1).with_direct_upload(true));
    let mut volume = ramp_volume();
    let cmp = volume.representation::<ComputeRep>(&ctx).unwrap();
    assert!(!cmp.is_shared());
    assert!(!volume.has_representation::<GraphicsRep>());
}

#[test]
fn test_exhaustion_is_reported() {
    let ctx = BackendContext::new(ContextConfig::default().with_budgets(64, 1 << 20)).unwrap();
    let mut volume = ramp_volume();
    let err = volume.representation::<GraphicsRep>(&ctx).unwrap_err();
    assert!(err.is_exhausted());
    assert!(!volume.has_representation::<GraphicsRep>());
    assert_eq!(ctx.graphics().memory_used(), 0);
}

#[test]
fn test_layout_mismatch_rejected() {
    let mut volume = ramp_volume();
    let wrong = HostRep::new(DataFormat::scalar(ScalarType::U8), UVec3::splat(4));
    let err = volume.add_representation(wrong).unwrap_err();
    assert!(err.is_type_error());
    assert!(err.to_string().contains("f32"));
}

#[test]
fn test_default_host_for_empty_object() {
    let ctx = ctx();
    let mut layer = Layer::with_meta(
        LayerMeta::default(),
        UVec3::new(4, 2, 1),
        DataFormat::vec4(ScalarType::U8),
    )
    .unwrap();
    let gfx = layer.representation::<GraphicsRep>(&ctx).unwrap();
    assert_eq!(gfx.size_bytes(), 32);
    assert_eq!(layer.valid_tags(), vec![BackendTag::Host, BackendTag::Graphics]);
}

#[test]
fn test_try_clone_copies_authoritative_only() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume.representation::<GraphicsRep>(&ctx).unwrap();
    volume.editable_representation::<GraphicsRep>(&ctx).unwrap();

    let mut copy = volume.try_clone(&ctx).unwrap();
    assert_eq!(copy.valid_tags(), vec![BackendTag::Graphics]);
    assert!(!copy.has_representation::<HostRep>());

    let gfx = volume.editable_representation::<GraphicsRep>(&ctx).unwrap();
    gfx.set_value(&ctx, UVec3::ZERO, 0, 100.0).unwrap();

    let host = copy.representation::<HostRep>(&ctx).unwrap();
    assert_eq!(host.value(UVec3::ZERO, 0), Some(0.0));
    assert_eq!(host.value(UVec3::new(1, 0, 0), 0), Some(1.0));
}

#[test]
fn test_set_extent_resets_contents() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume.representation::<ComputeRep>(&ctx).unwrap();

    volume.set_extent(&ctx, UVec3::new(2, 2, 2)).unwrap();
    assert_eq!(volume.extent(), UVec3::new(2, 2, 2));
    assert_eq!(volume.valid_tags(), vec![BackendTag::Host]);
    assert_eq!(ctx.sharing().stats().entries, 0);

    let gfx = volume.representation::<GraphicsRep>(&ctx).unwrap();
    assert_eq!(gfx.extent(), UVec3::new(2, 2, 2));
    assert_relative_eq!(gfx.value(&ctx, UVec3::ONE, 0).unwrap(), 0.0);
}

#[test]
fn test_remove_and_reseed() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume.representation::<GraphicsRep>(&ctx).unwrap();

    let removed = volume.remove_representation(&ctx, BackendTag::Graphics).unwrap().unwrap();
    assert!(matches!(removed, Representation::Graphics(_)));
    assert_eq!(volume.valid_tags(), vec![BackendTag::Host]);

    volume.add_representation(removed).unwrap();
    assert_eq!(volume.authoritative(), Some(BackendTag::Graphics));
    assert!(!volume.is_valid(BackendTag::Host));

    volume.remove_other_representations(&ctx, BackendTag::Graphics).unwrap();
    assert!(!volume.has_representation::<HostRep>());
    volume.clear_representations();
    assert!(!volume.has_representations());
    assert_eq!(ctx.graphics().memory_used(), 0);
}

#[test]
fn test_removing_graphics_detaches_shared_compute() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    let cmp = volume.representation::<ComputeRep>(&ctx).unwrap();
    assert!(cmp.is_shared());
    let gfx_id = cmp.native_id();

    let removed = volume.remove_representation(&ctx, BackendTag::Graphics).unwrap().unwrap();
    drop(removed);
    assert_eq!(ctx.sharing().ref_count(gfx_id), 0);

    assert!(volume.is_valid(BackendTag::Compute));
    let cmp = volume.representation::<ComputeRep>(&ctx).unwrap();
    assert!(!cmp.is_shared());
    assert_relative_eq!(cmp.value(&ctx, UVec3::new(1, 1, 1), 0).unwrap(), 21.0);
    assert_eq!(cmp.read_bytes(&ctx).unwrap().len(), 256);
}

#[test]
fn test_removing_graphics_drops_stale_shared_compute() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume.representation::<ComputeRep>(&ctx).unwrap();
    volume
        .editable_representation::<HostRep>(&ctx)
        .unwrap()
        .set_value(UVec3::ZERO, 0, -1.0)
        .unwrap();
    assert!(!volume.is_valid(BackendTag::Compute));

    volume.remove_representation(&ctx, BackendTag::Graphics).unwrap();
    assert!(!volume.has_representation::<ComputeRep>());
    assert_eq!(ctx.sharing().stats().entries, 0);

    let cmp = volume.representation::<ComputeRep>(&ctx).unwrap();
    assert_relative_eq!(cmp.value(&ctx, UVec3::ZERO, 0).unwrap(), -1.0);
}

#[test]
fn test_keeping_only_shared_compute() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume
        .editable_representation::<ComputeRep>(&ctx)
        .unwrap()
        .set_value(&ctx, UVec3::new(3, 3, 3), 0, 5.0)
        .unwrap();

    volume.remove_other_representations(&ctx, BackendTag::Compute).unwrap();
    assert_eq!(volume.valid_tags(), vec![BackendTag::Compute]);
    assert_eq!(ctx.graphics().memory_used(), 0);

    let host = volume.representation::<HostRep>(&ctx).unwrap();
    assert_relative_eq!(host.as_slice::<f32>().unwrap()[63], 5.0);
}

#[test]
fn test_replacing_graphics_under_shared_compute() {
    let ctx = ctx();
    let mut volume = ramp_volume();
    volume.representation::<ComputeRep>(&ctx).unwrap();

    let zeros = GraphicsRep::new(&ctx, volume.format(), volume.extent()).unwrap();
    volume.add_representation(zeros).unwrap();
    assert!(!volume.has_representation::<ComputeRep>());

    let cmp = volume.representation::<ComputeRep>(&ctx).unwrap();
    assert!(cmp.is_current());
    assert_relative_eq!(cmp.value(&ctx, UVec3::new(2, 2, 2), 0).unwrap(), 0.0);
}

#[test]
fn test_missing_representation_error() {
    let err = DataError::MissingRepresentation(BackendTag::Compute);
    assert_eq!(err.to_string(), "no compute representation");
    assert!(!err.is_type_error());
}

#[test]
fn test_dropping_object_frees_device_memory() {
    let ctx = ctx();
    {
        let mut volume = ramp_volume();
        volume.representation::<ComputeRep>(&ctx).unwrap();
        assert!(ctx.graphics().memory_used() > 0);
        assert_eq!(ctx.sharing().stats().refs, 1);
    }
    assert_eq!(ctx.graphics().memory_used(), 0);
    assert_eq!(ctx.compute().memory_used(), 0);
    assert_eq!(ctx.sharing().stats().entries, 0);
}
