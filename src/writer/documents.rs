//! Open documents owned by the writer.
//!
//! The store holds exactly one handle per document path. Other components
//! borrow a layer for the duration of one call.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::cache::delta_document;
use crate::connection::Connection;
use crate::document::{decode, encode, Encoding, Layer};
use crate::util::Logger;

/// One open document.
#[derive(Debug)]
pub struct Document {
    /// Store path of the canonical file.
    pub path: String,
    /// Canonical content.
    pub layer: Layer,
    /// Live-edit delta; edits land here while present.
    pub delta: Option<Layer>,
    dirty: bool,
}

impl Document {
    fn new(path: &str, layer: Layer) -> Self {
        Self {
            path: path.to_string(),
            layer,
            delta: None,
            dirty: false,
        }
    }

    /// Layer that receives edits: the delta while live, else the canonical layer.
    pub fn edit(&mut self) -> &mut Layer {
        self.dirty = true;
        match &mut self.delta {
            Some(delta) => delta,
            None => &mut self.layer,
        }
    }

    /// Canonical layer, bypassing any delta. Used for header metadata and
    /// structural edits made while the overlay is suspended.
    pub fn canonical(&mut self) -> &mut Layer {
        self.dirty = true;
        &mut self.layer
    }

    pub fn is_live(&self) -> bool {
        self.delta.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Every document the writer has open, keyed by store path.
#[derive(Debug)]
pub struct DocumentStore {
    encoding: Encoding,
    logger: Logger,
    docs: HashMap<String, Document>,
}

impl DocumentStore {
    pub fn new(encoding: Encoding, logger: Logger) -> Self {
        Self {
            encoding,
            logger,
            docs: HashMap::new(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Open `path`, loading it from the store when it exists.
    ///
    /// A file that cannot be decoded is logged and replaced by an empty layer.
    pub fn open_or_create(&mut self, conn: &dyn Connection, path: &str) -> &mut Document {
        let loaded = match self.docs.contains_key(path) {
            true => None,
            false => self.load(conn, path),
        };
        self.docs
            .entry(path.to_string())
            .or_insert_with(|| Document::new(path, loaded.unwrap_or_default()))
    }

    /// Open `path` as a new empty document, discarding any previous content.
    pub fn create(&mut self, path: &str) -> &mut Document {
        let mut doc = Document::new(path, Layer::new());
        doc.dirty = true;
        match self.docs.entry(path.to_string()) {
            Entry::Occupied(mut e) => {
                e.insert(doc);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(doc),
        }
    }

    /// Decode a persisted document without opening it.
    pub fn load(&self, conn: &dyn Connection, path: &str) -> Option<Layer> {
        if !conn.file_exists(path) {
            return None;
        }
        let bytes = conn.read_file(path)?;
        match decode(&bytes) {
            Ok(layer) => Some(layer),
            Err(e) => {
                self.logger
                    .error(format!("cannot decode document '{}': {}", conn.url(path), e));
                None
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.docs.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Document> {
        self.docs.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.docs.contains_key(path)
    }

    /// Paths of every open document.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.docs.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Forget a document without saving it.
    pub fn close(&mut self, path: &str) -> Option<Document> {
        self.docs.remove(path)
    }

    /// Write a layer in the store encoding.
    pub fn write_layer(&self, conn: &dyn Connection, path: &str, layer: &Layer) -> bool {
        match encode(layer, self.encoding) {
            Ok(bytes) => conn.write_file(&bytes, path, self.encoding.is_binary()),
            Err(e) => {
                self.logger
                    .error(format!("cannot encode document '{}': {}", conn.url(path), e));
                false
            }
        }
    }

    /// Persist one open document. A live document writes its canonical
    /// layer and its delta companion.
    pub fn save(&mut self, conn: &dyn Connection, path: &str) -> bool {
        let Some(doc) = self.docs.get(path) else {
            self.logger.warn(format!("save of unopened document '{}'", path));
            return false;
        };
        let mut ok = self.write_layer(conn, &doc.path, &doc.layer);
        if let Some(delta) = &doc.delta {
            ok &= self.write_layer(conn, &delta_document(&doc.path), delta);
        }
        if ok {
            if let Some(doc) = self.docs.get_mut(path) {
                doc.dirty = false;
            }
        }
        ok
    }

    /// Persist every dirty document.
    pub fn save_all(&mut self, conn: &dyn Connection) -> bool {
        let dirty: Vec<String> = self
            .docs
            .values()
            .filter(|d| d.dirty)
            .map(|d| d.path.clone())
            .collect();
        let mut ok = true;
        for path in dirty {
            ok &= self.save(conn, &path);
        }
        ok
    }

    /// Save and close.
    pub fn save_and_close(&mut self, conn: &dyn Connection, path: &str) -> bool {
        let ok = self.save(conn, path);
        self.docs.remove(path);
        ok
    }

    /// Close every document without saving.
    pub fn clear(&mut self) {
        self.docs.clear();
    }
}
