//! Session folder selection and scene document layout.

use std::path::Path;

use scene_mirror::document::{decode, Layer, PrimPath};
use scene_mirror::prelude::*;
use scene_mirror::util::MemorySink;

use tempfile::TempDir;

fn settings(dir: &Path) -> WriterSettings {
    WriterSettings {
        output_directory: dir.to_string_lossy().into_owned(),
        ..WriterSettings::default()
    }
}

fn read_layer(path: &Path) -> Layer {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    decode(&bytes).expect("document should decode")
}

#[test]
fn test_first_connect_creates_session_zero() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert_eq!(writer.session(), Some(0));
    writer.disconnect();

    let session = dir.path().join("Session_0");
    for folder in ["topologies", "geometries", "materials", "textures", "volumes"] {
        assert!(session.join(folder).is_dir(), "missing folder {}", folder);
    }

    let scene = read_layer(&session.join("Scene.sdoc"));
    assert_eq!(scene.header.default_prim.as_deref(), Some("Root"));
    assert_eq!(scene.header.up_axis, Some(UpAxis::Y));
    assert_eq!(scene.type_name(&PrimPath::new("/Root").unwrap()), Some("Xform"));
}

#[test]
fn test_new_session_numbering() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("Session_3")).unwrap();
    std::fs::create_dir_all(dir.path().join("Session_x")).unwrap();

    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert_eq!(writer.session(), Some(4));
    writer.disconnect();

    // Reusing the latest session instead of starting a new one
    let reuse = WriterSettings {
        create_new_session: false,
        ..settings(dir.path())
    };
    let mut writer = SceneWriter::new(reuse, Logger::tracing_only());
    assert!(writer.connect());
    assert_eq!(writer.session(), Some(4));
}

#[test]
fn test_multi_process_layout() {
    let dir = TempDir::new().unwrap();
    let process = |rank| WriterSettings {
        process: Some(ProcessLayout { rank, count: 2 }),
        ..settings(dir.path())
    };

    let mut first = SceneWriter::new(process(0), Logger::tracing_only());
    assert!(first.connect());
    let mut second = SceneWriter::new(process(1), Logger::tracing_only());
    assert!(second.connect());
    assert_eq!(first.session(), second.session());
    first.disconnect();
    second.disconnect();

    let session = dir.path().join("Session_0");
    assert!(session.join("Proc_0").join("Scene.sdoc").is_file());
    assert!(session.join("Proc_1").join("Scene.sdoc").is_file());

    let full = read_layer(&session.join("FullScene.sdoc"));
    assert_eq!(
        full.header.sublayers,
        vec!["Proc_0/Scene.sdoc".to_string(), "Proc_1/Scene.sdoc".to_string()]
    );
}

#[test]
fn test_actor_names_are_unique() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(1, "heart model"));
    assert!(writer.create_actor(2, "heart model"));
    assert!(writer.create_actor(3, "3d"));

    assert_eq!(writer.actor(1).unwrap().name, "heart_model");
    assert_eq!(writer.actor(2).unwrap().name, "heart_model_1");
    assert_eq!(writer.actor(3).unwrap().name, "_3d");
    writer.flush();

    let session = dir.path().join("Session_0");
    assert!(session.join("heart_model.sdoc").is_file());
    assert!(session.join("heart_model_1.sdoc").is_file());

    let scene = read_layer(&session.join("Scene.sdoc"));
    let prim = scene.prim(&PrimPath::new("/Root/heart_model_1").unwrap()).unwrap();
    let references = prim.references.as_ref().unwrap();
    assert_eq!(references[0].asset_path, "heart_model_1.sdoc");
}

#[test]
fn test_delete_actor_removes_document() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(1, "Gone"));
    writer.flush();

    let doc = dir.path().join("Session_0").join("Gone.sdoc");
    assert!(doc.is_file());
    assert!(writer.delete_actor(1));
    writer.flush();
    assert!(!doc.exists());

    let scene = read_layer(&dir.path().join("Session_0").join("Scene.sdoc"));
    assert!(!scene.has_prim(&PrimPath::new("/Root/Gone").unwrap()));
}

#[test]
#[should_panic(expected = "unknown actor id 9")]
fn test_unknown_actor_panics() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    writer.set_visibility(9, 0.0, true);
}

#[test]
fn test_operations_before_connect_are_logged() {
    let sink = MemorySink::new();
    let mut writer = SceneWriter::new(WriterSettings::default(), sink.logger());
    assert!(!writer.create_actor(1, "A"));
    assert!(sink.contains(Severity::Error, "not connected"));
}

#[test]
fn test_flush_records_time_range() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(1, "A"));
    writer.set_visibility(1, 2.0, true);
    writer.set_visibility(1, 10.0, false);
    assert!(writer.flush());
    assert_eq!(writer.time_range(), Some((2.0, 10.0)));

    let scene = read_layer(&dir.path().join("Session_0").join("Scene.sdoc"));
    assert_eq!(scene.header.start_time, Some(2.0));
    assert_eq!(scene.header.end_time, Some(10.0));
}

#[test]
fn test_actor_cannot_take_scene_document_name() {
    let dir = TempDir::new().unwrap();
    let mut writer = SceneWriter::new(settings(dir.path()), Logger::tracing_only());
    assert!(writer.connect());
    assert!(writer.create_actor(1, "Other"));
    assert!(writer.create_actor(2, "Scene"));
    assert!(writer.create_actor(3, "FullScene"));
    assert_eq!(writer.actor(2).unwrap().name, "Scene_1");
    assert_eq!(writer.actor(3).unwrap().name, "FullScene_1");
    assert!(writer.flush());

    let session = dir.path().join("Session_0");
    let scene = read_layer(&session.join("Scene.sdoc"));
    let prim = scene.prim(&PrimPath::new("/Root/Scene_1").unwrap()).unwrap();
    assert_eq!(prim.references.as_ref().unwrap()[0].asset_path, "Scene_1.sdoc");

    // Deleting it leaves the session scene document intact
    assert!(writer.delete_actor(2));
    assert!(writer.flush());
    assert!(!session.join("Scene_1.sdoc").exists());
    let scene = read_layer(&session.join("Scene.sdoc"));
    assert!(scene.has_prim(&PrimPath::new("/Root/Other").unwrap()));
    assert!(!scene.has_prim(&PrimPath::new("/Root/Scene_1").unwrap()));
}
