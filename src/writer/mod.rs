//! Scene persistence engine.
//!
//! [`SceneWriter`] is driven once per frame by the render-extraction layer.
//! It resolves cache records, persists attribute updates through the
//! [`Connection`], maintains clip ledgers and coordinates the live-edit
//! overlay around structural changes.
//!
//! Every public method reports failure as `false` plus a log record.
//! Referencing an actor or entity that was never created is a caller bug and
//! panics.

mod attributes;
mod data;
mod documents;
mod geom;
mod live;
mod material;
mod volume;

pub use data::*;
pub use documents::{Document, DocumentStore};

use std::collections::HashMap;
use std::sync::Arc;

use glam::DMat4;

use crate::cache::{
    live_document, scene_root, ActorCache, Folder, SessionLayout, SCENE_ROOT,
};
use crate::config::WriterSettings;
use crate::connection::{AssetClient, Connection, LocalConnection, RemoteConnection};
use crate::document::{Layer, Reference, UpAxis, Value, ValueType};
use crate::live::LiveState;
use crate::shading::{create_backends, ShadingBackend};
use crate::util::{EntityId, Logger, TimeCode};
use crate::volume::Voxelizer;

const VISIBILITY: &str = "visibility";
const TRANSFORM: &str = "xformOp:transform";
const TRANSFORM_ORDER: &str = "xformOpOrder";

/// Everything a write operation needs besides the actor map.
pub(crate) struct Ctx<'w> {
    pub conn: &'w dyn Connection,
    pub layout: &'w SessionLayout,
    pub docs: &'w mut DocumentStore,
    pub backends: &'w [Box<dyn ShadingBackend>],
    pub voxelizer: &'w Voxelizer,
    pub logger: &'w Logger,
    /// Edits currently go through live-edit deltas.
    pub live: bool,
    pub time_range: &'w mut Option<(TimeCode, TimeCode)>,
}

impl Ctx<'_> {
    /// Edit target of an open (or lazily opened) document.
    pub(crate) fn edit(&mut self, path: &str) -> &mut Layer {
        let conn = self.conn;
        self.docs.open_or_create(conn, path).edit()
    }

    pub(crate) fn scene_document(&self) -> String {
        self.layout.scene_document()
    }

    pub(crate) fn actor_document(&self, actor: &ActorCache) -> String {
        self.layout.store_path(&actor.document)
    }

    pub(crate) fn widen_time_range(&mut self, time: TimeCode) {
        *self.time_range = Some(match *self.time_range {
            Some((lo, hi)) => (lo.min(time), hi.max(time)),
            None => (time, time),
        });
    }

    /// Remove a store file if present.
    pub(crate) fn remove_file(&self, path: &str) -> bool {
        !self.conn.file_exists(path) || self.conn.remove_file(path)
    }

    /// Point the scene prim of `actor` at its document (or live container).
    pub(crate) fn write_actor_reference(&mut self, actor: &ActorCache, live: bool) {
        let asset = if live {
            live_document(&actor.document)
        } else {
            actor.document.clone()
        };
        let scene = self.scene_document();
        let layer = self.edit(&scene);
        layer.define_prim(&actor.path, Some("Xform"));
        layer.set_references(&actor.path, vec![Reference::new(asset, Some(actor.path.clone()))]);
    }
}

fn actor_mut(actors: &mut HashMap<EntityId, ActorCache>, id: EntityId) -> &mut ActorCache {
    actors
        .get_mut(&id)
        .unwrap_or_else(|| panic!("unknown actor id {}", id))
}

/// Incremental writer of one scene into a session folder.
pub struct SceneWriter {
    settings: WriterSettings,
    logger: Logger,
    connection: Option<Box<dyn Connection>>,
    layout: Option<SessionLayout>,
    documents: DocumentStore,
    actors: HashMap<EntityId, ActorCache>,
    backends: Vec<Box<dyn ShadingBackend>>,
    voxelizer: Voxelizer,
    live: LiveState,
    time_range: Option<(TimeCode, TimeCode)>,
}

impl SceneWriter {
    pub fn new(settings: WriterSettings, logger: Logger) -> Self {
        let documents = DocumentStore::new(settings.encoding(), logger.clone());
        let backends = create_backends(&settings.shading_backends);
        let voxelizer = Voxelizer::new(logger.clone(), settings.compress_volumes);
        Self {
            settings,
            logger,
            connection: None,
            layout: None,
            documents,
            actors: HashMap::new(),
            backends,
            voxelizer,
            live: LiveState::new(),
            time_range: None,
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&dyn Connection> {
        self.connection.as_deref()
    }

    /// Folder layout of the open session.
    pub fn layout(&self) -> Option<&SessionLayout> {
        self.layout.as_ref()
    }

    pub fn session(&self) -> Option<i32> {
        self.layout.as_ref().map(|l| l.session)
    }

    pub fn actor(&self, id: EntityId) -> Option<&ActorCache> {
        self.actors.get(&id)
    }

    pub fn actor_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.actors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Scene time range covered by updates so far.
    pub fn time_range(&self) -> Option<(TimeCode, TimeCode)> {
        self.time_range
    }

    pub(crate) fn parts(&mut self) -> Option<(Ctx<'_>, &mut HashMap<EntityId, ActorCache>)> {
        let conn = self.connection.as_deref()?;
        let layout = self.layout.as_ref()?;
        let ctx = Ctx {
            conn,
            layout,
            docs: &mut self.documents,
            backends: &self.backends,
            voxelizer: &self.voxelizer,
            logger: &self.logger,
            live: self.live.is_active(),
            time_range: &mut self.time_range,
        };
        Some((ctx, &mut self.actors))
    }

    /// `parts` for public entry points: logs when not connected.
    pub(crate) fn connected_parts(
        &mut self,
        op: &str,
    ) -> Option<(Ctx<'_>, &mut HashMap<EntityId, ActorCache>)> {
        if self.connection.is_none() || self.layout.is_none() {
            self.logger.error(format!("{}: writer is not connected", op));
            return None;
        }
        self.parts()
    }

    // ------------------------------------------------------------------
    // Connection and session
    // ------------------------------------------------------------------

    /// Open the store named by the settings. Remote hosts need
    /// [`SceneWriter::connect_remote`].
    pub fn connect(&mut self) -> bool {
        if self.settings.is_remote() {
            self.logger.error(format!(
                "host '{}' needs an asset client, use connect_remote",
                self.settings.host
            ));
            return false;
        }
        let conn = LocalConnection::new(self.logger.clone());
        self.connect_with(Box::new(conn))
    }

    /// Open a remote store through `client`.
    pub fn connect_remote(&mut self, client: Arc<dyn AssetClient>) -> bool {
        let conn = RemoteConnection::new(client, self.logger.clone());
        self.connect_with(Box::new(conn))
    }

    /// Initialize `connection`, pick the session and write the scene document.
    pub fn connect_with(&mut self, mut connection: Box<dyn Connection>) -> bool {
        if self.connection.is_some() {
            self.disconnect();
        }
        if !connection.initialize(&self.settings.connection_settings()) {
            self.logger.error("cannot open the output store");
            return false;
        }

        // Secondary processes join the session rank 0 created.
        let rank = self.settings.process_layout().map_or(0, |(rank, _)| rank);
        let latest = connection.max_session_number();
        let session = if (self.settings.create_new_session && rank == 0) || latest < 0 {
            latest + 1
        } else {
            latest
        };
        let layout = SessionLayout::new(session, self.settings.process_layout());

        let mut ok = connection.create_folder(&layout.session_dir(), true, true)
            && connection.create_folder(&layout.scene_dir(), true, true);
        for folder in Folder::ALL {
            ok &= connection.create_folder(&layout.folder(folder), true, true);
        }
        if !ok {
            self.logger.error(format!(
                "cannot create session folders under '{}'",
                connection.url(&layout.scene_dir())
            ));
            connection.shutdown();
            return false;
        }

        self.logger.info(format!(
            "writing session {} to '{}'",
            session,
            connection.url(&layout.scene_dir())
        ));
        self.connection = Some(connection);
        self.layout = Some(layout);
        self.time_range = None;

        let mut ok = self.init_scene_documents();
        if self.settings.live_edit {
            ok &= self.set_live_edit(true);
        }
        ok
    }

    fn header_template(&self) -> Layer {
        let mut layer = Layer::new();
        layer.header.up_axis = Some(self.settings.up_axis);
        layer.header.default_prim = Some(SCENE_ROOT.to_string());
        layer.header.time_codes_per_second = Some(self.settings.time_codes_per_second);
        layer
    }

    fn init_scene_documents(&mut self) -> bool {
        let template = self.header_template();
        let Some((mut ctx, _)) = self.parts() else {
            return false;
        };
        let scene = ctx.scene_document();
        let doc = ctx.docs.open_or_create(ctx.conn, &scene);
        let layer = doc.canonical();
        layer.header.up_axis = template.header.up_axis;
        layer.header.default_prim = template.header.default_prim.clone();
        layer.header.time_codes_per_second = template.header.time_codes_per_second;
        layer.define_prim(&scene_root(), Some("Xform"));
        let mut ok = ctx.docs.save(ctx.conn, &scene);

        if let (Some(full), Some((0, _))) = (ctx.layout.full_scene_document(), ctx.layout.process) {
            let mut full_layer = template;
            full_layer.header.sublayers = ctx.layout.process_scene_documents();
            ok &= ctx.docs.write_layer(ctx.conn, &full, &full_layer);
        }
        ok
    }

    /// Merge any live edits, flush and release the connection.
    pub fn disconnect(&mut self) {
        if self.connection.is_none() {
            return;
        }
        if self.live.is_active() {
            self.detach_live();
        }
        self.live = LiveState::new();
        self.flush();
        self.documents.clear();
        self.actors.clear();
        if let Some(mut conn) = self.connection.take() {
            conn.shutdown();
        }
        self.layout = None;
        self.logger.info("writer disconnected");
    }

    /// Persist every touched document.
    pub fn flush(&mut self) -> bool {
        let Some((mut ctx, _)) = self.connected_parts("flush") else {
            return false;
        };
        if let Some((start, end)) = *ctx.time_range {
            let scene = ctx.scene_document();
            let doc = ctx.docs.open_or_create(ctx.conn, &scene);
            let header = &mut doc.canonical().header;
            header.start_time = Some(header.start_time.map_or(start, |s| s.min(start)));
            header.end_time = Some(header.end_time.map_or(end, |e| e.max(end)));
        }
        let ok = ctx.docs.save_all(ctx.conn);
        if !ok {
            ctx.logger.error("flush: some documents could not be written");
        }
        ok
    }

    // ------------------------------------------------------------------
    // Actors
    // ------------------------------------------------------------------

    fn unique_actor_name(&self, name: &str) -> String {
        let base = crate::cache::sanitize_name(name);
        let taken = |n: &str| {
            crate::cache::is_reserved_stem(n) || self.actors.values().any(|a| a.name == n)
        };
        if !taken(&base) {
            return base;
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|n| !taken(n))
            .unwrap_or(base)
    }

    /// Create an actor and its document. Names are sanitized and made
    /// unique within the session.
    pub fn create_actor(&mut self, id: EntityId, name: &str) -> bool {
        if self.actors.contains_key(&id) {
            self.logger.warn(format!("actor {} already exists", id));
            return false;
        }
        let unique = self.unique_actor_name(name);
        let template = self.header_template();
        let Some((mut ctx, actors)) = self.connected_parts("create actor") else {
            return false;
        };

        let cache = ActorCache::new(id, &unique);
        let actor_doc = ctx.actor_document(&cache);
        let doc = ctx.docs.open_or_create(ctx.conn, &actor_doc);
        let layer = doc.canonical();
        layer.header.up_axis = template.header.up_axis;
        layer.header.default_prim = template.header.default_prim;
        layer.header.time_codes_per_second = template.header.time_codes_per_second;
        layer.define_prim(&scene_root(), Some("Xform"));
        layer.define_prim(&cache.path, Some("Xform"));
        let mut ok = ctx.docs.save(ctx.conn, &actor_doc);
        if ctx.live {
            ok &= crate::live::attach_overlay(ctx.docs, ctx.conn, &actor_doc);
        }

        let live = ctx.live;
        ctx.write_actor_reference(&cache, live);
        ctx.logger
            .info(format!("created actor {} as '{}'", id, cache.name));
        actors.insert(id, cache);
        ok
    }

    /// Remove an actor with every document and file it owns.
    pub fn delete_actor(&mut self, id: EntityId) -> bool {
        if !self.actors.contains_key(&id) {
            panic!("unknown actor id {}", id);
        }
        self.with_live_suspended(|w| w.delete_actor_now(id))
    }

    fn delete_actor_now(&mut self, id: EntityId) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("delete actor") else {
            return false;
        };
        let Some(mut cache) = actors.remove(&id) else {
            return false;
        };

        let mut ok = true;
        for kind in crate::cache::GeomKind::ALL {
            for geom_id in cache.geom_ids(kind) {
                if let Some(record) = cache.remove_geom(kind, geom_id) {
                    ok &= ctx.remove_geom_files(&cache.name, &record);
                }
            }
        }
        for tex_id in cache.texture_ids() {
            if let Some(tex) = cache.remove_texture(tex_id) {
                for file in tex.files() {
                    ok &= ctx.remove_file(&ctx.layout.store_path(&file));
                }
            }
        }

        let actor_doc = ctx.actor_document(&cache);
        ctx.docs.close(&actor_doc);
        ok &= ctx.remove_file(&actor_doc);

        let scene = ctx.scene_document();
        ctx.edit(&scene).remove_prim(&cache.path);
        ctx.logger.info(format!("deleted actor {} ('{}')", id, cache.name));
        ok
    }

    /// Show or hide an actor from `time` on.
    pub fn set_visibility(&mut self, actor: EntityId, time: TimeCode, visible: bool) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("set visibility") else {
            return false;
        };
        let path = actor_mut(actors, actor).path.clone();
        let token = if visible { "inherited" } else { "invisible" };
        let scene = ctx.scene_document();
        ctx.edit(&scene)
            .set_sample(&path, VISIBILITY, ValueType::Token, time, Value::Token(token.into()));
        ctx.widen_time_range(time);
        true
    }

    /// Author the actor's local-to-world transform at `time`.
    pub fn set_transform(&mut self, actor: EntityId, time: TimeCode, transform: &DMat4) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("set transform") else {
            return false;
        };
        let path = actor_mut(actors, actor).path.clone();
        let scene = ctx.scene_document();
        let layer = ctx.edit(&scene);
        layer.set_sample(
            &path,
            TRANSFORM,
            ValueType::Matrix4d,
            time,
            Value::Matrix4d(transform.to_cols_array()),
        );
        layer.set_default(
            &path,
            TRANSFORM_ORDER,
            ValueType::TokenArray,
            Value::TokenArray(vec![TRANSFORM.to_string()]),
        );
        ctx.widen_time_range(time);
        true
    }

    /// Play actor-local time `actor_time` at scene time `scene_time`.
    pub fn set_actor_time(&mut self, actor: EntityId, scene_time: TimeCode, actor_time: TimeCode) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("set actor time") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        cache.timeline.set(scene_time, actor_time);
        ctx.widen_time_range(scene_time);
        ctx.write_all_clip_sets(cache);
        true
    }

    /// Return the actor to scene time.
    pub fn clear_actor_time(&mut self, actor: EntityId) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("clear actor time") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        cache.timeline.clear();
        ctx.write_all_clip_sets(cache);
        true
    }

    /// Up axis written into new documents.
    pub fn up_axis(&self) -> UpAxis {
        self.settings.up_axis
    }
}

impl Drop for SceneWriter {
    fn drop(&mut self) {
        self.disconnect();
    }
}
