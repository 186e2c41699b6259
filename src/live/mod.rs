//! Live-edit overlay.
//!
//! While live editing is on, every scene and actor document carries a delta
//! layer that receives all edits, and a live container document layering the
//! delta over the canonical file. Clip sub-documents are edited through live
//! counterparts so the canonical clips stay untouched.
//!
//! Turning the overlay off composes each delta that authored anything under
//! the scene root back into its canonical document, copies live clips back to
//! their canonical paths and removes every delta and live file.

use crate::cache::{
    canonical_document, delta_document, live_document, relative_path, scene_root, SessionLayout,
    SCENE_ROOT,
};
use crate::clips::ClipLedger;
use crate::connection::Connection;
use crate::document::{compose, Layer};
use crate::util::Logger;
use crate::writer::DocumentStore;

/// Overlay switch plus the suspension depth of structural operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveState {
    enabled: bool,
    suspended: u32,
}

impl LiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live editing was requested, even if currently suspended.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Edits currently go through deltas.
    pub fn is_active(&self) -> bool {
        self.enabled && self.suspended == 0
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Enter a suspended scope. Returns true for the outermost scope of an
    /// active overlay, which is the one that has to merge.
    pub fn suspend(&mut self) -> bool {
        self.suspended += 1;
        self.enabled && self.suspended == 1
    }

    /// Leave a suspended scope. Returns true when the overlay must be
    /// re-attached.
    pub fn resume(&mut self) -> bool {
        assert!(self.suspended > 0, "live overlay resumed without a matching suspend");
        self.suspended -= 1;
        self.enabled && self.suspended == 0
    }
}

/// Container layering the delta over the canonical document.
pub fn live_container(canonical_path: &str) -> Layer {
    let live = live_document(canonical_path);
    let mut layer = Layer::new();
    layer.header.sublayers = vec![
        relative_path(&live, &delta_document(canonical_path)),
        relative_path(&live, canonical_path),
    ];
    layer.header.default_prim = Some(SCENE_ROOT.to_string());
    layer
}

/// Attach an empty delta to an open document and write its live container.
pub fn attach_overlay(store: &mut DocumentStore, conn: &dyn Connection, path: &str) -> bool {
    let Some(doc) = store.get_mut(path) else {
        return false;
    };
    if doc.delta.is_none() {
        let mut delta = Layer::new_overlay();
        delta.header.up_axis = doc.layer.header.up_axis;
        doc.delta = Some(delta);
        doc.mark_dirty();
    }
    let ok = store.write_layer(conn, &live_document(path), &live_container(path));
    ok && store.save(conn, path)
}

/// Merge a document's delta into its canonical layer and drop the overlay.
///
/// A delta without any authored content under the scene root is discarded
/// unchanged. Returns false if a file operation failed.
pub fn merge_overlay(
    store: &mut DocumentStore,
    conn: &dyn Connection,
    logger: &Logger,
    path: &str,
) -> bool {
    let Some(doc) = store.get_mut(path) else {
        return false;
    };
    let Some(delta) = doc.delta.take() else {
        return true;
    };
    if delta.has_content_under(&scene_root()) {
        doc.layer = compose(&delta, &doc.layer);
        logger.info(format!("merged live edits into '{}'", conn.url(path)));
    }
    doc.mark_dirty();

    let mut ok = store.save(conn, path);
    for companion in [delta_document(path), live_document(path)] {
        if conn.file_exists(&companion) {
            ok &= conn.remove_file(&companion);
        }
    }
    ok
}

/// Point clip asset `index` at its live counterpart, copying the canonical
/// clip if it exists. New clips simply start at the live path.
pub fn migrate_clip_to_live(
    conn: &dyn Connection,
    layout: &SessionLayout,
    ledger: &mut ClipLedger,
    index: usize,
) -> bool {
    let Some(asset) = ledger.asset(index) else {
        return false;
    };
    if asset.live {
        return true;
    }
    let canonical = asset.path.clone();
    let live = live_document(&canonical);
    let src = layout.store_path(&canonical);
    let ok = !conn.file_exists(&src) || conn.copy_file(&src, &layout.store_path(&live));
    if ok {
        ledger.set_asset_path(index, live, true);
    }
    ok
}

/// Copy every live clip of `ledger` back to its canonical path and rewrite
/// the asset references. Dead live assets only get their file removed.
pub fn restore_clips(conn: &dyn Connection, layout: &SessionLayout, ledger: &mut ClipLedger) -> bool {
    let mut ok = true;
    let live_assets: Vec<(usize, String, bool)> = ledger
        .assets()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.live)
        .map(|(i, a)| (i, a.path.clone(), a.alive))
        .collect();

    for (index, live, alive) in live_assets {
        let canonical = canonical_document(&live);
        let live_store = layout.store_path(&live);
        if conn.file_exists(&live_store) {
            if alive {
                ok &= conn.copy_file(&live_store, &layout.store_path(&canonical));
            }
            ok &= conn.remove_file(&live_store);
        }
        ledger.set_asset_path(index, canonical, false);
    }
    ok
}
