//! Entity cache and path registry.
//!
//! The writer owns one [`ActorCache`] per actor. An actor cache owns the
//! records of its geometries, materials and textures, created lazily on
//! first reference through the `get_or_create_*` accessors.
//!
//! Geometry records of the four kinds live in a fixed array of maps indexed
//! by [`GeomKind`].

mod attributes;
mod naming;

pub use attributes::*;
pub use naming::*;

use std::collections::HashMap;
use std::fmt;

use crate::clips::{ActorTimeline, ClipLedger};
use crate::document::PrimPath;
use crate::shading::{ReaderNodes, ShadingBackendKind, WrapMode};
use crate::util::{EntityId, TimeCode};
use crate::writer::InstanceShape;

/// Kinds of addressable scene content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Actor,
    Mesh,
    Instancer,
    Curve,
    Volume,
    Material,
    Texture,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Actor => "actor",
            Self::Mesh => "mesh",
            Self::Instancer => "instancer",
            Self::Curve => "curve",
            Self::Volume => "volume",
            Self::Material => "material",
            Self::Texture => "texture",
        };
        f.write_str(name)
    }
}

/// Geometry entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeomKind {
    Mesh = 0,
    Instancer = 1,
    Curve = 2,
    Volume = 3,
}

impl GeomKind {
    pub const ALL: [GeomKind; 4] = [
        GeomKind::Mesh,
        GeomKind::Instancer,
        GeomKind::Curve,
        GeomKind::Volume,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Prefix of the geometry prim name.
    pub const fn prim_prefix(self) -> &'static str {
        match self {
            Self::Mesh => "MeshGeom",
            Self::Instancer => "InstancerGeom",
            Self::Curve => "CurveGeom",
            Self::Volume => "VolumeGeom",
        }
    }

    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Mesh => EntityKind::Mesh,
            Self::Instancer => EntityKind::Instancer,
            Self::Curve => EntityKind::Curve,
            Self::Volume => EntityKind::Volume,
        }
    }

    /// Volumes carry a private shading graph instead of a shared binding.
    pub const fn uses_private_material(self) -> bool {
        matches!(self, Self::Volume)
    }
}

/// Cache record of one mesh, instancer, curve or volume.
#[derive(Clone, Debug)]
pub struct GeomRecord {
    pub kind: GeomKind,
    pub id: EntityId,
    pub path: PrimPath,
    /// Scene-relative manifest document.
    pub manifest: String,
    /// Written as a simpler primitive (single-sphere instancer as points).
    pub uses_alternate_rep: bool,
    pub ledger: ClipLedger,
    pub attributes: AttributeTracker,
    pub material: Option<EntityId>,
    /// Prototype shapes currently authored (instancers).
    pub prototypes: Vec<InstanceShape>,
    /// Field prims currently authored (volumes).
    pub fields: Vec<String>,
}

impl GeomRecord {
    fn new(actor: &str, kind: GeomKind, id: EntityId) -> Self {
        Self {
            kind,
            id,
            path: geom_prim_path(actor, kind, id),
            manifest: manifest_document(actor, kind, id),
            uses_alternate_rep: false,
            ledger: ClipLedger::new(),
            attributes: AttributeTracker::new(),
            material: None,
            prototypes: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Prim type for the current representation.
    pub fn prim_type(&self) -> &'static str {
        match (self.kind, self.uses_alternate_rep) {
            (GeomKind::Mesh, _) => "Mesh",
            (GeomKind::Instancer, false) => "PointInstancer",
            (GeomKind::Instancer, true) => "Points",
            (GeomKind::Curve, _) => "BasisCurves",
            (GeomKind::Volume, _) => "Volume",
        }
    }
}

/// Cache record of one material.
#[derive(Clone, Debug)]
pub struct MaterialRecord {
    pub id: EntityId,
    pub path: PrimPath,
    /// Shared reader nodes, once created.
    pub readers: Option<ReaderNodes>,
    /// Surface shader node per backend.
    pub shaders: Vec<(ShadingBackendKind, PrimPath)>,
    pub time_varying: bool,
    pub texture: Option<EntityId>,
}

impl MaterialRecord {
    fn new(actor: &str, id: EntityId) -> Self {
        Self {
            id,
            path: material_prim_path(actor, id),
            readers: None,
            shaders: Vec::new(),
            time_varying: false,
            texture: None,
        }
    }
}

/// Cache record of one texture.
#[derive(Clone, Debug)]
pub struct TextureRecord {
    pub id: EntityId,
    /// Scene-relative image written for static textures.
    pub default_file: String,
    pub has_default: bool,
    /// Time-stamped images written while time-varying.
    pub time_files: Vec<(TimeCode, String)>,
    pub wrap: [WrapMode; 2],
    pub time_varying: bool,
}

impl TextureRecord {
    fn new(actor: &str, id: EntityId) -> Self {
        Self {
            id,
            default_file: texture_file(actor, id, None),
            has_default: false,
            time_files: Vec::new(),
            wrap: [WrapMode::Repeat; 2],
            time_varying: false,
        }
    }

    /// Image backing the texture at `time`.
    pub fn file_at(&self, time: TimeCode) -> Option<&str> {
        let stamped = self
            .time_files
            .iter()
            .find(|(t, _)| *t == time)
            .map(|(_, f)| f.as_str());
        match stamped {
            Some(f) if self.time_varying => Some(f),
            _ if self.has_default => Some(self.default_file.as_str()),
            _ => stamped,
        }
    }

    /// Time steps with a time-stamped image.
    pub fn time_steps(&self) -> Vec<TimeCode> {
        self.time_files.iter().map(|(t, _)| *t).collect()
    }

    /// Every image file written for this texture.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.time_files.iter().map(|(_, f)| f.clone()).collect();
        if self.has_default {
            files.push(self.default_file.clone());
        }
        files
    }
}

/// Everything the writer knows about one actor.
#[derive(Debug)]
pub struct ActorCache {
    pub id: EntityId,
    /// Sanitized, session-unique name.
    pub name: String,
    pub path: PrimPath,
    /// Scene-relative actor document.
    pub document: String,
    pub timeline: ActorTimeline,
    geoms: [HashMap<EntityId, GeomRecord>; 4],
    materials: HashMap<EntityId, MaterialRecord>,
    textures: HashMap<EntityId, TextureRecord>,
}

impl ActorCache {
    /// `name` must already be sanitized.
    pub fn new(id: EntityId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            path: actor_prim_path(name),
            document: actor_document(name),
            timeline: ActorTimeline::new(),
            geoms: Default::default(),
            materials: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// Record for `(kind, id)`, created on first reference.
    pub fn get_or_create_geom(&mut self, kind: GeomKind, id: EntityId) -> (bool, &mut GeomRecord) {
        let name = &self.name;
        let mut is_new = false;
        let record = self.geoms[kind.index()].entry(id).or_insert_with(|| {
            is_new = true;
            GeomRecord::new(name, kind, id)
        });
        (is_new, record)
    }

    pub fn geom(&self, kind: GeomKind, id: EntityId) -> Option<&GeomRecord> {
        self.geoms[kind.index()].get(&id)
    }

    pub fn geom_mut(&mut self, kind: GeomKind, id: EntityId) -> Option<&mut GeomRecord> {
        self.geoms[kind.index()].get_mut(&id)
    }

    pub fn remove_geom(&mut self, kind: GeomKind, id: EntityId) -> Option<GeomRecord> {
        self.geoms[kind.index()].remove(&id)
    }

    /// Geometry ids of one kind, sorted.
    pub fn geom_ids(&self, kind: GeomKind) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.geoms[kind.index()].keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn geoms(&self) -> impl Iterator<Item = &GeomRecord> {
        self.geoms.iter().flat_map(|m| m.values())
    }

    pub fn geoms_mut(&mut self) -> impl Iterator<Item = &mut GeomRecord> {
        self.geoms.iter_mut().flat_map(|m| m.values_mut())
    }

    pub fn get_or_create_material(&mut self, id: EntityId) -> (bool, &mut MaterialRecord) {
        let name = &self.name;
        let mut is_new = false;
        let record = self.materials.entry(id).or_insert_with(|| {
            is_new = true;
            MaterialRecord::new(name, id)
        });
        (is_new, record)
    }

    pub fn material(&self, id: EntityId) -> Option<&MaterialRecord> {
        self.materials.get(&id)
    }

    pub fn remove_material(&mut self, id: EntityId) -> Option<MaterialRecord> {
        self.materials.remove(&id)
    }

    /// Materials whose diffuse color reads texture `id`.
    pub fn materials_using_texture(&self, id: EntityId) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .materials
            .values()
            .filter(|m| m.texture == Some(id))
            .map(|m| m.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn get_or_create_texture(&mut self, id: EntityId) -> (bool, &mut TextureRecord) {
        let name = &self.name;
        let mut is_new = false;
        let record = self.textures.entry(id).or_insert_with(|| {
            is_new = true;
            TextureRecord::new(name, id)
        });
        (is_new, record)
    }

    pub fn texture(&self, id: EntityId) -> Option<&TextureRecord> {
        self.textures.get(&id)
    }

    pub fn remove_texture(&mut self, id: EntityId) -> Option<TextureRecord> {
        self.textures.remove(&id)
    }

    pub fn texture_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.textures.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn material_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.materials.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut actor = ActorCache::new(1, "A");
        let first = {
            let (is_new, rec) = actor.get_or_create_geom(GeomKind::Mesh, 7);
            assert!(is_new);
            rec.material = Some(3);
            rec as *const GeomRecord
        };
        let (is_new, rec) = actor.get_or_create_geom(GeomKind::Mesh, 7);
        assert!(!is_new);
        assert_eq!(rec as *const GeomRecord, first);
        assert_eq!(rec.material, Some(3));
        assert_eq!(rec.path.as_str(), "/Root/A/MeshGeom_7");
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut actor = ActorCache::new(1, "A");
        actor.get_or_create_geom(GeomKind::Mesh, 1);
        let (is_new, rec) = actor.get_or_create_geom(GeomKind::Curve, 1);
        assert!(is_new);
        assert_eq!(rec.prim_type(), "BasisCurves");
        assert_eq!(actor.geoms().count(), 2);
        assert!(actor.remove_geom(GeomKind::Mesh, 1).is_some());
        assert!(actor.geom(GeomKind::Mesh, 1).is_none());
        assert!(actor.geom(GeomKind::Curve, 1).is_some());
    }

    #[test]
    fn test_materials_and_textures() {
        let mut actor = ActorCache::new(1, "A");
        let (is_new, mat) = actor.get_or_create_material(2);
        assert!(is_new);
        mat.texture = Some(5);
        assert!(!actor.get_or_create_material(2).0);
        assert_eq!(actor.materials_using_texture(5), vec![2]);

        let (_, tex) = actor.get_or_create_texture(5);
        tex.time_varying = true;
        tex.time_files.push((1.0, texture_file("A", 5, Some(1.0))));
        assert_eq!(tex.file_at(1.0), Some("textures/A_Texture_5_1.png"));
        assert_eq!(tex.file_at(2.0), None);
        tex.has_default = true;
        assert_eq!(tex.file_at(2.0), Some("textures/A_Texture_5.png"));
        assert_eq!(actor.texture(5).unwrap().files().len(), 2);
    }
}
