//! Live-edit overlay: edits land in deltas and merge back losslessly.

use std::collections::BTreeMap;
use std::path::Path;

use glam::DMat4;
use scene_mirror::document::{decode, Layer, PrimPath};
use scene_mirror::prelude::*;

use tempfile::TempDir;

const ACTOR: EntityId = 1;

fn settings(dir: &Path, live: bool) -> WriterSettings {
    WriterSettings {
        output_directory: dir.to_string_lossy().into_owned(),
        live_edit: live,
        ..WriterSettings::default()
    }
}

fn read_layer(path: &Path) -> Layer {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    decode(&bytes).expect("document should decode")
}

/// Every file below `root`, keyed by its relative path.
fn collect_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// A representative editing session.
fn drive(writer: &mut SceneWriter) {
    assert!(writer.create_actor(ACTOR, "Heart"));
    writer.set_transform(ACTOR, 0.0, &DMat4::from_translation(glam::DVec3::new(1.0, 2.0, 3.0)));
    writer.set_visibility(ACTOR, 0.0, true);

    let indices = [0, 1, 2];
    for t in 0..3 {
        let offset = t as f32;
        let points = [[offset, 0.0, 0.0], [offset + 1.0, 0.0, 0.0], [offset, 1.0, 0.0]];
        let data = MeshData {
            points: &points,
            face_vertex_indices: &indices,
            time_varying: GeomAttrs::POINTS,
            ..MeshData::default()
        };
        assert!(writer.update_mesh(ACTOR, 7, t as f64, &data, None, &[], &[]));
    }
    assert!(writer.remove_geom_at_time(ACTOR, GeomKind::Mesh, 7, 1.0));

    let material = MaterialData {
        diffuse: [0.2, 0.4, 0.6],
        time_varying: true,
        ..MaterialData::default()
    };
    assert!(writer.update_material(ACTOR, 3, 0.0, &material));

    // Single sphere prototype is written as points, then retyped
    let positions = [[0.0f32, 0.0, 0.0], [1.0, 1.0, 1.0]];
    let spheres = InstancerData {
        positions: &positions,
        shapes: &[InstanceShape::Sphere],
        ..InstancerData::default()
    };
    assert!(writer.update_instancer(ACTOR, 9, 0.0, &spheres, Some(3), &[], &[]));
    let mixed = InstancerData {
        positions: &positions,
        proto_indices: Some(&[0, 1][..]),
        shapes: &[InstanceShape::Cube, InstanceShape::Sphere],
        time_varying: GeomAttrs::POINTS,
        ..InstancerData::default()
    };
    assert!(writer.update_instancer(ACTOR, 9, 1.0, &mixed, Some(3), &[], &[]));
    assert!(writer.flush());
}

#[test]
fn test_live_session_matches_direct_session() {
    let direct_dir = TempDir::new().unwrap();
    let live_dir = TempDir::new().unwrap();

    let mut direct = SceneWriter::new(settings(direct_dir.path(), false), Logger::tracing_only());
    assert!(direct.connect());
    drive(&mut direct);
    direct.disconnect();

    let mut live = SceneWriter::new(settings(live_dir.path(), true), Logger::tracing_only());
    assert!(live.connect());
    assert!(live.is_live());
    drive(&mut live);
    live.disconnect();

    let direct_files = collect_files(&direct_dir.path().join("Session_0"));
    let live_files = collect_files(&live_dir.path().join("Session_0"));
    assert_eq!(
        direct_files.keys().collect::<Vec<_>>(),
        live_files.keys().collect::<Vec<_>>()
    );

    for (rel, bytes) in &direct_files {
        if rel.ends_with(".sdoc") {
            let a = decode(bytes).unwrap();
            let b = decode(&live_files[rel]).unwrap();
            assert_eq!(a, b, "{} differs after merging live edits", rel);
        } else {
            assert_eq!(bytes, &live_files[rel], "{} differs", rel);
        }
    }
}

#[test]
fn test_edits_stay_in_delta_until_merged() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("Session_0");
    let mut writer = SceneWriter::new(settings(dir.path(), false), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(ACTOR, "A"));
    assert!(writer.set_live_edit(true));
    assert!(writer.is_live());

    let points = [[0.0f32; 3]; 3];
    let indices = [0, 1, 2];
    let data = MeshData {
        points: &points,
        face_vertex_indices: &indices,
        time_varying: GeomAttrs::POINTS,
        ..MeshData::default()
    };
    assert!(writer.update_mesh(ACTOR, 7, 0.0, &data, None, &[], &[]));
    assert!(writer.flush());

    let prim = PrimPath::new("/Root/A/MeshGeom_7").unwrap();
    assert!(!read_layer(&session.join("A.sdoc")).has_prim(&prim));
    assert!(read_layer(&session.join("A.delta.sdoc")).has_prim(&prim));
    assert!(session.join("A.live.sdoc").is_file());
    assert!(session.join("geometries/A_MeshGeom_7_0.live.sdoc").is_file());

    // The scene references the live container while editing
    let scene = read_layer(&session.join("Scene.sdoc"));
    let delta = read_layer(&session.join("Scene.delta.sdoc"));
    let composed = scene_mirror::document::compose(&delta, &scene);
    let actor = composed.prim(&PrimPath::new("/Root/A").unwrap()).unwrap();
    assert_eq!(actor.references.as_ref().unwrap()[0].asset_path, "A.live.sdoc");

    assert!(writer.set_live_edit(false));
    assert!(!writer.is_live());
    assert!(read_layer(&session.join("A.sdoc")).has_prim(&prim));
    assert!(!session.join("A.delta.sdoc").exists());
    assert!(!session.join("A.live.sdoc").exists());
    assert!(!session.join("geometries/A_MeshGeom_7_0.live.sdoc").exists());
    assert!(session.join("geometries/A_MeshGeom_7_0.sdoc").is_file());

    let actor = read_layer(&session.join("A.sdoc"));
    let clips = actor.prim(&prim).unwrap().clips.clone().unwrap();
    assert_eq!(clips.asset_paths, vec!["geometries/A_MeshGeom_7_0.sdoc".to_string()]);
}

#[test]
fn test_suspension_nests() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("Session_0");
    let mut writer = SceneWriter::new(settings(dir.path(), true), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(ACTOR, "A"));

    writer.with_live_suspended(|w| {
        assert!(!w.is_live());
        assert!(!session.join("A.delta.sdoc").exists());
        w.with_live_suspended(|inner| assert!(!inner.is_live()));
        assert!(!w.is_live());
    });
    assert!(writer.is_live());
    assert!(session.join("A.live.sdoc").is_file());
}

#[test]
fn test_deletions_bypass_the_overlay() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("Session_0");
    let mut writer = SceneWriter::new(settings(dir.path(), false), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(ACTOR, "A"));
    let material = MaterialData::default();
    assert!(writer.update_material(ACTOR, 3, 0.0, &material));
    assert!(writer.flush());

    let material_path = PrimPath::new("/Root/A/Materials/Material_3").unwrap();
    assert!(read_layer(&session.join("A.sdoc")).has_prim(&material_path));

    assert!(writer.set_live_edit(true));
    assert!(writer.delete_material(ACTOR, 3));
    assert!(writer.is_live());

    // Removed from the canonical document, not tombstoned in the delta
    assert!(!read_layer(&session.join("A.sdoc")).has_prim(&material_path));
    assert!(!read_layer(&session.join("A.delta.sdoc")).has_prim(&material_path));
    assert!(session.join("A.live.sdoc").is_file());
}
