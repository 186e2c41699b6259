//! Writing through a remote asset client.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use scene_mirror::connection::{ConnectionStatus, LoopbackServer};
use scene_mirror::document::{decode, PrimPath};
use scene_mirror::prelude::*;
use scene_mirror::util::MemorySink;

const HOST: &str = "studio";

fn remote_settings() -> WriterSettings {
    WriterSettings {
        host: HOST.to_string(),
        output_directory: "/projects/demo".to_string(),
        ..WriterSettings::default()
    }
}

fn connection_settings() -> ConnectionSettings {
    remote_settings().connection_settings()
}

/// Poll until the server holds a sign-in request.
fn wait_for_pending(server: &LoopbackServer) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while server.pending_authentications() == 0 {
        assert!(Instant::now() < deadline, "no authentication request arrived");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_writer_over_loopback() {
    let server = LoopbackServer::new(HOST, "alice");
    let mut writer = SceneWriter::new(remote_settings(), Logger::tracing_only());
    assert!(writer.connect_remote(Arc::new(server.client())));
    assert_eq!(writer.session(), Some(0));
    assert_eq!(writer.connection().and_then(|c| c.current_user()).as_deref(), Some("alice"));

    assert!(writer.create_actor(1, "A"));
    let points = [[0.0f32; 3]; 3];
    let indices = [0, 1, 2];
    let data = MeshData {
        points: &points,
        face_vertex_indices: &indices,
        time_varying: GeomAttrs::POINTS,
        ..MeshData::default()
    };
    assert!(writer.update_mesh(1, 7, 0.0, &data, None, &[], &[]));
    assert!(writer.flush());

    let stored = server.file("projects/demo/Session_0/A.sdoc").expect("actor document on server");
    let actor = decode(&stored).unwrap();
    assert!(actor.has_prim(&PrimPath::new("/Root/A/MeshGeom_7").unwrap()));
    assert!(server.file("projects/demo/Session_0/geometries/A_MeshGeom_7_0.sdoc").is_some());
    assert!(server.file("projects/demo/Session_0/Scene.sdoc").is_some());

    assert!(writer.remove_geom(1, GeomKind::Mesh, 7));
    assert!(server.file("projects/demo/Session_0/geometries/A_MeshGeom_7_0.sdoc").is_none());
    assert!(server.file("projects/demo/Session_0/topologies/A_MeshGeom_7.sdoc").is_none());
    writer.disconnect();

    // A second writer starts the next session
    let mut next = SceneWriter::new(remote_settings(), Logger::tracing_only());
    assert!(next.connect_remote(Arc::new(server.client())));
    assert_eq!(next.session(), Some(1));
}

#[test]
fn test_connect_without_client_fails() {
    let sink = MemorySink::new();
    let mut writer = SceneWriter::new(remote_settings(), sink.logger());
    assert!(!writer.connect());
    assert!(!writer.is_connected());
    assert!(sink.contains(Severity::Error, "connect_remote"));
}

#[test]
fn test_read_only_server_is_rejected() {
    let server = LoopbackServer::new(HOST, "alice");
    server.set_read_only(true);
    let sink = MemorySink::new();
    let mut writer = SceneWriter::new(remote_settings(), sink.logger());
    assert!(!writer.connect_remote(Arc::new(server.client())));
    assert!(sink.count(Severity::Error) > 0);
}

#[test]
fn test_unknown_host_fails() {
    let server = LoopbackServer::new("elsewhere", "alice");
    let mut conn = RemoteConnection::new(Arc::new(server.client()), Logger::tracing_only());
    assert!(!conn.initialize(&connection_settings()));
    assert_eq!(conn.status(), ConnectionStatus::ConnectFailed);
}

#[test]
fn test_interactive_auth_approved() {
    let server = LoopbackServer::new(HOST, "alice");
    server.require_interactive_auth(true);
    let mut conn = RemoteConnection::new(Arc::new(server.client()), Logger::tracing_only());

    let approver = {
        let server = server.clone();
        thread::spawn(move || {
            wait_for_pending(&server);
            server.approve_authentication()
        })
    };
    assert!(conn.initialize(&connection_settings()));
    assert_eq!(approver.join().unwrap(), 1);
    assert_eq!(conn.status(), ConnectionStatus::Connected);
}

#[test]
fn test_interactive_auth_cancelled() {
    let server = LoopbackServer::new(HOST, "alice");
    server.require_interactive_auth(true);
    let sink = MemorySink::new();
    let mut conn = RemoteConnection::new(Arc::new(server.client()), sink.logger());
    let cancel = conn.auth_cancel_handle();

    let canceller = {
        let server = server.clone();
        thread::spawn(move || {
            wait_for_pending(&server);
            cancel.cancel()
        })
    };
    assert!(!conn.initialize(&connection_settings()));
    assert!(canceller.join().unwrap());
    assert_eq!(conn.status(), ConnectionStatus::AuthCancelled);
    assert_eq!(server.pending_authentications(), 0);
    assert!(sink.contains(Severity::Error, "cancelled"));
}
