//! Sub-region extraction through data objects.

use vis_core::brick::{linear_index, Brick};
use vis_data::prelude::*;

fn ctx() -> BackendContext {
    BackendContext::new(ContextConfig::default().with_budgets(1 << 20, 1 << 20)).unwrap()
}

fn cube(n: u32) -> Volume {
    let count = (n * n * n) as i32;
    let host = HostRep::from_vec(1, UVec3::splat(n), (0..count).collect()).unwrap();
    Volume::from_host(VolumeMeta::default(), host).unwrap()
}

#[test]
fn test_clamp_inside_corner_block() {
    let ctx = ctx();
    let mut volume = cube(3);
    let host = volume.representation::<HostRep>(&ctx).unwrap();
    let sub = host
        .sub_region(IVec3::new(1, 0, 0), UVec3::splat(2), BorderMode::Clamp)
        .unwrap();
    assert_eq!(sub.extent(), UVec3::splat(2));
    assert_eq!(sub.as_slice::<i32>().unwrap(), &[1, 2, 4, 5, 10, 11, 13, 14]);
}

#[test]
fn test_extract_after_graphics_edit() {
    let ctx = ctx();
    let mut volume = cube(3);
    let gfx = volume.editable_representation::<GraphicsRep>(&ctx).unwrap();
    gfx.set_value(&ctx, UVec3::new(2, 1, 1), 0, -1.0).unwrap();

    let host = volume.representation::<HostRep>(&ctx).unwrap();
    let sub = host
        .sub_region(IVec3::new(1, 1, 1), UVec3::splat(2), BorderMode::Clamp)
        .unwrap();
    assert_eq!(sub.as_slice::<i32>().unwrap(), &[13, -1, 16, 17, 22, 23, 25, 26]);
}

#[test]
fn test_clamp_clips_out_of_bounds() {
    let host = HostRep::from_vec(1, UVec3::new(4, 4, 1), (0..16u8).collect()).unwrap();
    let sub = host
        .sub_region(IVec3::new(-1, 2, 0), UVec3::new(3, 4, 1), BorderMode::Clamp)
        .unwrap();
    assert_eq!(sub.extent(), UVec3::new(2, 2, 1));
    assert_eq!(sub.as_slice::<u8>().unwrap(), &[8, 9, 12, 13]);
}

#[test]
fn test_fill_keeps_requested_size() {
    let host = HostRep::from_vec(1, UVec3::new(4, 4, 1), (1..=16u8).collect()).unwrap();
    let sub = host
        .sub_region(IVec3::new(-1, 2, 0), UVec3::new(3, 4, 1), BorderMode::Fill)
        .unwrap();
    assert_eq!(sub.extent(), UVec3::new(3, 4, 1));
    #[rustfmt::skip]
    let expected = [
        0,  9, 10,
        0, 13, 14,
        0,  0,  0,
        0,  0,  0,
    ];
    assert_eq!(sub.as_slice::<u8>().unwrap(), &expected);
}

#[test]
fn test_fully_outside_clamp_is_error() {
    let host = HostRep::from_vec(1, UVec3::new(2, 2, 2), vec![1.0f32; 8]).unwrap();
    let err = host
        .sub_region(IVec3::new(5, 0, 0), UVec3::ONE, BorderMode::Clamp)
        .unwrap_err();
    assert!(err.to_string().contains("region"));

    let filled = host
        .sub_region(IVec3::new(5, 0, 0), UVec3::ONE, BorderMode::Fill)
        .unwrap();
    assert_eq!(filled.as_slice::<f32>().unwrap(), &[0.0]);
}

#[test]
fn test_zero_extent_returns_full_frame() {
    let host = HostRep::from_vec(1, UVec3::new(2, 2, 1), vec![1u16, 2, 3, 4]).unwrap();
    let sub = host.sub_region(IVec3::ZERO, UVec3::ZERO, BorderMode::Clamp).unwrap();
    assert_eq!(sub, host);
}

#[test]
fn test_multi_component_region() {
    let fmt = DataFormat::new(ScalarType::U16, 3).unwrap();
    let extent = UVec3::new(3, 2, 1);
    let data: Vec<u16> = (0..18).collect();
    let host = HostRep::from_vec(3, extent, data).unwrap();
    assert_eq!(host.format(), fmt);

    let sub = host
        .sub_region(IVec3::new(1, 1, 0), UVec3::new(2, 1, 1), BorderMode::Clamp)
        .unwrap();
    let start = linear_index(UVec3::new(1, 1, 0), extent) * 3;
    let expected: Vec<u16> = (start as u16..start as u16 + 6).collect();
    assert_eq!(sub.as_slice::<u16>().unwrap(), expected.as_slice());
}

#[test]
fn test_brick_indices_match_region() {
    let dims = UVec3::splat(3);
    let brick = Brick::new(UVec3::new(1, 0, 0), UVec3::splat(2));
    let indices: Vec<usize> = brick.iter(dims).unwrap().collect();
    assert_eq!(indices, vec![1, 2, 4, 5, 10, 11, 13, 14]);
}
