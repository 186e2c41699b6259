//! Volumes: voxelization, grid files and field prims.

use std::path::Path;

use scene_mirror::document::{decode, Layer, PrimPath};
use scene_mirror::prelude::*;
use scene_mirror::volume::{read_grids, Grid, Voxelizer, DENSITY_GRID, DIFFUSE_GRID};

use tempfile::TempDir;

fn ramp_tf() -> TransferFunction {
    TransferFunction {
        value_range: [0.0, 255.0],
        colors: vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
        opacities: vec![0.0, 0.25, 0.9],
    }
}

fn volume<'a>(values: &'a [u8], tf: Option<&'a TransferFunction>, pre_classified: bool) -> VolumeData<'a> {
    VolumeData {
        data: VolumeArray::Uint8(values),
        components: 1,
        dims: [4, 4, 4],
        spacing: [1.0, 1.0, 1.0],
        origin: [0.0, 0.0, 0.0],
        background_index: None,
        channel: "density",
        transfer_function: tf,
        pre_classified,
    }
}

fn read_layer(path: &Path) -> Layer {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    decode(&bytes).expect("document should decode")
}

#[test]
fn test_pre_classified_opacity_at_maximum() {
    let tf = ramp_tf();
    let mut values = [0u8; 64];
    values[5] = u8::MAX;
    values[6] = 128;

    let voxelizer = Voxelizer::new(Logger::tracing_only(), true);
    let bytes = voxelizer
        .grid_file_bytes(&volume(&values, Some(&tf), true))
        .expect("voxelization should succeed");
    let file = read_grids(&bytes).unwrap();
    assert_eq!(file.names(), vec![DENSITY_GRID, DIFFUSE_GRID]);

    let Some(Grid::Float(density)) = file.grid(DENSITY_GRID) else {
        panic!("density grid should hold floats");
    };
    // Voxel 5 is (1, 1, 0) in a 4x4x4 x-fastest layout
    assert_eq!(density.get([1, 1, 0]), tf.sample_opacity(1.0));
    assert_eq!(density.get([2, 1, 0]), tf.classify(128.0).1);
    // Zero maps to zero opacity, which is the background
    assert_eq!(density.active_voxel_count(), 2);

    let Some(Grid::Vec3f(diffuse)) = file.grid(DIFFUSE_GRID) else {
        panic!("diffuse grid should hold colors");
    };
    assert_eq!(diffuse.get([1, 1, 0]), [1.0, 0.0, 0.0]);
}

#[test]
fn test_pre_classification_needs_transfer_function() {
    let values = [0u8; 64];
    let voxelizer = Voxelizer::new(Logger::tracing_only(), false);
    assert!(voxelizer.voxelize(&volume(&values, None, true)).is_err());
    assert!(voxelizer.grid_file_bytes(&volume(&values, None, true)).is_none());
}

#[test]
fn test_wrong_voxel_count_is_rejected() {
    let values = [0u8; 10];
    let voxelizer = Voxelizer::new(Logger::tracing_only(), false);
    assert!(voxelizer.voxelize(&volume(&values, None, false)).is_err());
}

#[test]
fn test_volume_geometry_files() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("Session_0");
    let settings = WriterSettings {
        output_directory: dir.path().to_string_lossy().into_owned(),
        ..WriterSettings::default()
    };
    let mut writer = SceneWriter::new(settings, Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(1, "A"));

    let mut values = [0u8; 64];
    values[0] = 200;
    let tf = ramp_tf();

    // Time-varying: one grid per step, paths relative to the clip
    let animated = VolumeInput {
        data: volume(&values, Some(&tf), false),
        time_varying: true,
    };
    assert!(writer.update_volume(1, 3, 0.0, &animated));
    // Static: a single grid, path relative to the actor document
    let still = VolumeInput {
        data: volume(&values, None, false),
        time_varying: false,
    };
    assert!(writer.update_volume(1, 4, 0.0, &still));
    assert!(writer.flush());

    assert!(session.join("volumes/A_VolumeGeom_3_0.vgrid").is_file());
    assert!(session.join("volumes/A_VolumeGeom_4.vgrid").is_file());

    let field = PrimPath::new("/Root/A/VolumeGeom_3/density").unwrap();
    let clip = read_layer(&session.join("geometries/A_VolumeGeom_3_0.sdoc"));
    let file_path = clip.attribute(&field, "filePath").unwrap();
    assert_eq!(
        file_path.samples.get(0.0),
        Some(&Value::Asset("../volumes/A_VolumeGeom_3_0.vgrid".into()))
    );

    let actor = read_layer(&session.join("A.sdoc"));
    assert_eq!(actor.type_name(&field), Some("VolumeField"));
    let volume_prim = actor.prim(&PrimPath::new("/Root/A/VolumeGeom_3").unwrap()).unwrap();
    assert_eq!(volume_prim.relationships.get("field:density"), Some(&vec![field.clone()]));
    assert_eq!(
        volume_prim.relationships.get("material:binding"),
        Some(&vec![PrimPath::new("/Root/A/VolumeGeom_3/VolumeMaterial").unwrap()])
    );

    let static_field = PrimPath::new("/Root/A/VolumeGeom_4/density").unwrap();
    assert_eq!(
        actor.attribute(&static_field, "filePath").unwrap().default,
        Some(Value::Asset("volumes/A_VolumeGeom_4.vgrid".into()))
    );

    // The grid decodes and holds the one non-zero voxel
    let grid_bytes = std::fs::read(session.join("volumes/A_VolumeGeom_3_0.vgrid")).unwrap();
    let grids = read_grids(&grid_bytes).unwrap();
    assert_eq!(grids.names(), vec!["density"]);
    assert_eq!(grids.grids[0].active_voxel_count(), 1);

    assert!(writer.remove_geom(1, GeomKind::Volume, 3));
    assert!(!session.join("volumes/A_VolumeGeom_3_0.vgrid").exists());
    assert!(!session.join("geometries/A_VolumeGeom_3_0.sdoc").exists());
    assert!(session.join("volumes/A_VolumeGeom_4.vgrid").is_file());
}
