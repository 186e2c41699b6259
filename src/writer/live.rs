//! Live-edit orchestration across the scene and actor documents.

use super::{Ctx, SceneWriter};
use crate::cache::ActorCache;
use crate::clips::ActorTimeline;
use crate::cache::GeomRecord;
use crate::live::{attach_overlay, merge_overlay, restore_clips};

impl Ctx<'_> {
    /// Rewrite the clip metadata of one geometry in the actor document.
    pub(crate) fn write_clip_set(&mut self, actor_doc: &str, timeline: &ActorTimeline, record: &GeomRecord) {
        if record.ledger.is_empty() {
            return;
        }
        let clips = timeline.retime(&record.ledger, &record.path, &record.manifest);
        self.edit(actor_doc).set_clips(&record.path, clips);
    }

    pub(crate) fn write_all_clip_sets(&mut self, actor: &ActorCache) {
        let actor_doc = self.actor_document(actor);
        for record in actor.geoms() {
            self.write_clip_set(&actor_doc, &actor.timeline, record);
        }
    }
}

impl SceneWriter {
    /// Live editing is requested and not currently suspended.
    pub fn is_live(&self) -> bool {
        self.live.is_active()
    }

    /// Turn the live-edit overlay on or off.
    ///
    /// Turning it off merges every delta into its canonical document.
    pub fn set_live_edit(&mut self, enabled: bool) -> bool {
        if enabled == self.live.is_enabled() {
            return true;
        }
        let attached = self.connection.is_some() && !self.live.is_suspended();
        if !attached {
            self.live.set_enabled(enabled);
            return true;
        }
        if enabled {
            self.live.set_enabled(true);
            self.attach_live()
        } else {
            let ok = self.detach_live();
            self.live.set_enabled(false);
            ok
        }
    }

    /// Run `f` with the overlay merged away.
    ///
    /// Structural operations (deletions, retyping) run inside this scope so
    /// they never observe a half-migrated overlay. Scopes nest; only the
    /// outermost one merges and re-attaches.
    pub fn with_live_suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.live.suspend() && self.connection.is_some() {
            self.detach_live();
        }
        let result = f(self);
        if self.live.resume() && self.connection.is_some() {
            self.attach_live();
        }
        result
    }

    pub(crate) fn attach_live(&mut self) -> bool {
        let Some((mut ctx, actors)) = self.parts() else {
            return false;
        };
        let scene = ctx.scene_document();
        ctx.docs.open_or_create(ctx.conn, &scene);
        let mut ok = attach_overlay(ctx.docs, ctx.conn, &scene);

        let mut ids: Vec<_> = actors.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(actor) = actors.get(&id) else {
                continue;
            };
            let actor_doc = ctx.actor_document(actor);
            ctx.docs.open_or_create(ctx.conn, &actor_doc);
            ok &= attach_overlay(ctx.docs, ctx.conn, &actor_doc);
            ctx.write_actor_reference(actor, true);
        }
        ok &= ctx.docs.save(ctx.conn, &scene);
        ctx.logger.info("live editing enabled");
        ok
    }

    pub(crate) fn detach_live(&mut self) -> bool {
        let Some((mut ctx, actors)) = self.parts() else {
            return false;
        };
        let mut ok = true;
        let mut ids: Vec<_> = actors.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(actor) = actors.get_mut(&id) else {
                continue;
            };
            let actor_doc = ctx.actor_document(actor);
            let mut restored = false;
            for record in actor.geoms_mut() {
                if record.ledger.assets().iter().any(|a| a.live) {
                    ok &= restore_clips(ctx.conn, ctx.layout, &mut record.ledger);
                    restored = true;
                }
            }
            if restored {
                ctx.write_all_clip_sets(actor);
            }
            ctx.write_actor_reference(actor, false);
            ok &= merge_overlay(ctx.docs, ctx.conn, ctx.logger, &actor_doc);
        }
        let scene = ctx.scene_document();
        ok &= merge_overlay(ctx.docs, ctx.conn, ctx.logger, &scene);
        ctx.logger.info("live editing disabled, edits merged");
        ok
    }
}
