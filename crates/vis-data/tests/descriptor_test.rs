//! Descriptor persistence tests.

#![cfg(feature = "serde")]

use glam::{DVec2, Mat3, Vec3};
use vis_data::prelude::*;
use vis_data::{
    Buffer, BufferMeta, BufferTarget, BufferUsage, DataDescriptor, KindMeta, LayerMeta, LayerType,
};

#[test]
fn test_volume_descriptor_yaml_roundtrip() {
    let meta = VolumeMeta {
        basis: Mat3::from_diagonal(Vec3::new(2.0, 2.0, 0.5)),
        offset: Vec3::new(-1.0, -1.0, 0.0),
        data_range: DVec2::new(0.0, 4095.0),
        value_range: DVec2::new(-1000.0, 3000.0),
    };
    let volume = Volume::with_meta(meta, UVec3::new(64, 64, 32), DataFormat::scalar(ScalarType::U16)).unwrap();

    let yaml = serde_yaml::to_string(&volume.descriptor()).unwrap();
    assert!(yaml.contains("kind: volume"));

    let desc: DataDescriptor = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(desc, volume.descriptor());

    let loaded = Volume::from_descriptor(&desc).unwrap();
    assert_eq!(loaded.meta(), &meta);
    assert_eq!(loaded.format(), volume.format());
    assert!(!loaded.has_representations());
}

#[test]
fn test_descriptor_never_carries_payload() {
    let ctx = BackendContext::new(ContextConfig::default().with_budgets(1 << 20, 1 << 20)).unwrap();
    let host = HostRep::from_vec(1, UVec3::new(4, 4, 1), vec![7u8; 16]).unwrap();
    let mut layer = vis_data::Layer::from_host(LayerMeta { layer_type: LayerType::Depth }, host).unwrap();
    layer.representation::<GraphicsRep>(&ctx).unwrap();

    let yaml = serde_yaml::to_string(&layer.descriptor()).unwrap();
    assert!(yaml.contains("depth"));
    assert!(!yaml.contains('7'));

    let mut loaded = vis_data::Layer::from_descriptor(&serde_yaml::from_str(&yaml).unwrap()).unwrap();
    let host = loaded.representation::<HostRep>(&ctx).unwrap();
    assert_eq!(host.as_slice::<u8>().unwrap(), &[0u8; 16]);
}

#[test]
fn test_kind_mismatch_on_load() {
    let desc = DataDescriptor {
        kind: DataKindId::Buffer,
        extent: UVec3::new(128, 1, 1),
        format: DataFormat::new(ScalarType::U32, 1).unwrap(),
        meta: KindMeta::Buffer(BufferMeta {
            target: BufferTarget::Index,
            usage: BufferUsage::Dynamic,
        }),
    };
    assert!(Buffer::from_descriptor(&desc).is_ok());
    assert!(Volume::from_descriptor(&desc).unwrap_err().is_type_error());

    let yaml = serde_yaml::to_string(&desc).unwrap();
    assert!(yaml.contains("index"));
    assert!(yaml.contains("dynamic"));
}
