//! Deterministic names and paths.
//!
//! Everything here is a pure function of the actor's unique name, the entity
//! kind and the entity id, so a reopened session derives the same paths
//! without a persisted index.

use super::GeomKind;
use crate::connection::{join_path, SESSION_PREFIX};
use crate::document::{document_file, PrimPath};
use crate::util::{EntityId, TimeCode};
use crate::volume::GRID_EXTENSION;

/// Name of the scene root prim.
pub const SCENE_ROOT: &str = "Root";
/// Scope holding an actor's materials.
pub const MATERIALS_SCOPE: &str = "Materials";
/// Private material of a volume.
pub const VOLUME_MATERIAL: &str = "VolumeMaterial";
/// Scope holding instancer prototypes.
pub const PROTOTYPES_SCOPE: &str = "Prototypes";

const SCENE_DOCUMENT: &str = "Scene";
const FULL_SCENE_DOCUMENT: &str = "FullScene";
const PROCESS_PREFIX: &str = "Proc_";

/// Map an arbitrary name onto `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Invalid characters become `_`; a leading digit gets a `_` prefix and an
/// empty name becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match out.chars().next() {
        None => out.push('_'),
        Some(c) if c.is_ascii_digit() => out.insert(0, '_'),
        _ => {}
    }
    out
}

/// True for stems owned by session-level documents, which actor documents
/// must not reuse.
pub fn is_reserved_stem(name: &str) -> bool {
    name == SCENE_DOCUMENT || name == FULL_SCENE_DOCUMENT
}

/// File-name friendly rendering of a time code: `12`, `n3`, `1_5`.
pub fn time_suffix(time: TimeCode) -> String {
    let text = if time.fract() == 0.0 && time.abs() < 1e15 {
        format!("{}", time as i64)
    } else {
        format!("{}", time)
    };
    text.replace('-', "n").replace('.', "_").replace('+', "")
}

/// `/Root`
pub fn scene_root() -> PrimPath {
    PrimPath::root().child(SCENE_ROOT)
}

/// `/Root/<Actor>`
pub fn actor_prim_path(actor: &str) -> PrimPath {
    scene_root().child(actor)
}

/// `<Kind>Geom_<id>`
pub fn geom_prim_name(kind: GeomKind, id: EntityId) -> String {
    format!("{}_{}", kind.prim_prefix(), id)
}

/// `/Root/<Actor>/<Kind>Geom_<id>`
pub fn geom_prim_path(actor: &str, kind: GeomKind, id: EntityId) -> PrimPath {
    actor_prim_path(actor).child(&geom_prim_name(kind, id))
}

/// `/Root/<Actor>/Materials/Material_<id>`
pub fn material_prim_path(actor: &str, id: EntityId) -> PrimPath {
    actor_prim_path(actor)
        .child(MATERIALS_SCOPE)
        .child(&format!("Material_{}", id))
}

/// Private material of a volume geometry.
pub fn volume_material_path(actor: &str, id: EntityId) -> PrimPath {
    geom_prim_path(actor, GeomKind::Volume, id).child(VOLUME_MATERIAL)
}

/// Scene-relative subdirectories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Folder {
    Materials,
    Geometries,
    Topologies,
    Textures,
    Volumes,
}

impl Folder {
    pub const ALL: [Folder; 5] = [
        Folder::Materials,
        Folder::Geometries,
        Folder::Topologies,
        Folder::Textures,
        Folder::Volumes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Materials => "materials",
            Self::Geometries => "geometries",
            Self::Topologies => "topologies",
            Self::Textures => "textures",
            Self::Volumes => "volumes",
        }
    }
}

fn entity_stem(actor: &str, kind: GeomKind, id: EntityId) -> String {
    format!("{}_{}", actor, geom_prim_name(kind, id))
}

/// Scene-relative actor document, `<Actor>.sdoc`.
pub fn actor_document(actor: &str) -> String {
    document_file(actor)
}

/// Scene-relative manifest, `topologies/<Actor>_<Kind>Geom_<id>.sdoc`.
pub fn manifest_document(actor: &str, kind: GeomKind, id: EntityId) -> String {
    join_path(Folder::Topologies.name(), &document_file(&entity_stem(actor, kind, id)))
}

/// Scene-relative clip, `geometries/<Actor>_<Kind>Geom_<id>_<time>.sdoc`.
pub fn clip_document(actor: &str, kind: GeomKind, id: EntityId, time: TimeCode) -> String {
    let stem = format!("{}_{}", entity_stem(actor, kind, id), time_suffix(time));
    join_path(Folder::Geometries.name(), &document_file(&stem))
}

/// Scene-relative voxel grid file for one volume time step, or the static
/// one when `time` is `None`.
pub fn volume_grid_file(actor: &str, id: EntityId, time: Option<TimeCode>) -> String {
    let mut stem = entity_stem(actor, GeomKind::Volume, id);
    if let Some(t) = time {
        stem = format!("{}_{}", stem, time_suffix(t));
    }
    join_path(Folder::Volumes.name(), &format!("{}.{}", stem, GRID_EXTENSION))
}

/// Scene-relative texture image, time-stamped when `time` is given.
pub fn texture_file(actor: &str, id: EntityId, time: Option<TimeCode>) -> String {
    let mut stem = format!("{}_Texture_{}", actor, id);
    if let Some(t) = time {
        stem = format!("{}_{}", stem, time_suffix(t));
    }
    join_path(Folder::Textures.name(), &format!("{}.png", stem))
}

/// Live-edit delta companion of a document: `a/b.sdoc` -> `a/b.delta.sdoc`.
pub fn delta_document(path: &str) -> String {
    with_infix(path, "delta")
}

/// Live-edit container of a document: `a/b.sdoc` -> `a/b.live.sdoc`.
pub fn live_document(path: &str) -> String {
    with_infix(path, "live")
}

/// True for paths produced by [`live_document`].
pub fn is_live_document(path: &str) -> bool {
    path.ends_with(&format!(".live.{}", crate::document::DOCUMENT_EXTENSION))
}

/// Canonical path of a live clip produced by [`live_document`].
pub fn canonical_document(live_path: &str) -> String {
    let ext = crate::document::DOCUMENT_EXTENSION;
    match live_path.strip_suffix(&format!(".live.{}", ext)) {
        Some(stem) => format!("{}.{}", stem, ext),
        None => live_path.to_string(),
    }
}

fn with_infix(path: &str, infix: &str) -> String {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
            format!("{}.{}.{}", stem, infix, ext)
        }
        _ => format!("{}.{}", path, infix),
    }
}

/// Path of `target` relative to the directory containing `from`.
///
/// Both paths are relative to the same root.
pub fn relative_path(from: &str, target: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = from_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat("..").take(from_dir.len() - common).collect();
    parts.extend_from_slice(&target_parts[common..]);
    parts.join("/")
}

/// Folder layout of one session (and process).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLayout {
    pub session: i32,
    /// `(rank, count)` in multi-process runs.
    pub process: Option<(u32, u32)>,
}

impl SessionLayout {
    pub fn new(session: i32, process: Option<(u32, u32)>) -> Self {
        Self { session, process }
    }

    /// `Session_<N>`
    pub fn session_dir(&self) -> String {
        format!("{}{}", SESSION_PREFIX, self.session)
    }

    /// `Session_<N>` or `Session_<N>/Proc_<P>`.
    pub fn scene_dir(&self) -> String {
        match self.process {
            Some((rank, _)) => join_path(&self.session_dir(), &format!("{}{}", PROCESS_PREFIX, rank)),
            None => self.session_dir(),
        }
    }

    /// Store path of a scene-relative path.
    pub fn store_path(&self, relative: &str) -> String {
        join_path(&self.scene_dir(), relative)
    }

    pub fn folder(&self, folder: Folder) -> String {
        self.store_path(folder.name())
    }

    /// Per-process scene document.
    pub fn scene_document(&self) -> String {
        self.store_path(&document_file(SCENE_DOCUMENT))
    }

    /// Top-level document sublayering every process scene, multi-process only.
    pub fn full_scene_document(&self) -> Option<String> {
        self.process
            .map(|_| join_path(&self.session_dir(), &document_file(FULL_SCENE_DOCUMENT)))
    }

    /// Scene documents of every process, relative to the session directory.
    pub fn process_scene_documents(&self) -> Vec<String> {
        match self.process {
            Some((_, count)) => (0..count)
                .map(|rank| {
                    join_path(&format!("{}{}", PROCESS_PREFIX, rank), &document_file(SCENE_DOCUMENT))
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_stems() {
        assert!(is_reserved_stem("Scene"));
        assert!(is_reserved_stem("FullScene"));
        assert!(!is_reserved_stem("Scene_1"));
        assert!(!is_reserved_stem("scene"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Actor"), "Actor");
        assert_eq!(sanitize_name("my actor-1.vtk"), "my_actor_1_vtk");
        assert_eq!(sanitize_name("3d"), "_3d");
        assert_eq!(sanitize_name(""), "_");
        assert_eq!(sanitize_name("ÄÖ"), "__");
        assert_eq!(sanitize_name("_ok_9"), "_ok_9");
    }

    #[test]
    fn test_paths_are_deterministic() {
        for kind in GeomKind::ALL {
            assert_eq!(geom_prim_path("A", kind, 7), geom_prim_path("A", kind, 7));
            assert_eq!(manifest_document("A", kind, 7), manifest_document("A", kind, 7));
        }
        assert_eq!(geom_prim_path("A", GeomKind::Mesh, 7).as_str(), "/Root/A/MeshGeom_7");
        assert_eq!(material_prim_path("A", 2).as_str(), "/Root/A/Materials/Material_2");
        assert_eq!(
            manifest_document("A", GeomKind::Instancer, 3),
            "topologies/A_InstancerGeom_3.sdoc"
        );
        assert_eq!(
            clip_document("A", GeomKind::Mesh, 7, 1.5),
            "geometries/A_MeshGeom_7_1_5.sdoc"
        );
        assert_eq!(volume_grid_file("A", 4, Some(-2.0)), "volumes/A_VolumeGeom_4_n2.vgrid");
        assert_eq!(texture_file("A", 1, None), "textures/A_Texture_1.png");
    }

    #[test]
    fn test_live_companions() {
        let doc = "geometries/A_MeshGeom_7_0.sdoc";
        assert_eq!(delta_document(doc), "geometries/A_MeshGeom_7_0.delta.sdoc");
        let live = live_document(doc);
        assert_eq!(live, "geometries/A_MeshGeom_7_0.live.sdoc");
        assert!(is_live_document(&live));
        assert!(!is_live_document(doc));
        assert_eq!(canonical_document(&live), doc);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("Session_1/A.sdoc", "Session_1/geometries/x.sdoc"), "geometries/x.sdoc");
        assert_eq!(relative_path("Session_1/FullScene.sdoc", "Session_1/Proc_0/Scene.sdoc"), "Proc_0/Scene.sdoc");
        assert_eq!(relative_path("a/b/c.sdoc", "a/d.sdoc"), "../d.sdoc");
        assert_eq!(relative_path("c.sdoc", "d.sdoc"), "d.sdoc");
    }

    #[test]
    fn test_session_layout() {
        let single = SessionLayout::new(3, None);
        assert_eq!(single.scene_document(), "Session_3/Scene.sdoc");
        assert_eq!(single.full_scene_document(), None);
        assert_eq!(single.folder(Folder::Volumes), "Session_3/volumes");

        let multi = SessionLayout::new(0, Some((1, 2)));
        assert_eq!(multi.scene_dir(), "Session_0/Proc_1");
        assert_eq!(multi.full_scene_document().as_deref(), Some("Session_0/FullScene.sdoc"));
        assert_eq!(
            multi.process_scene_documents(),
            vec!["Proc_0/Scene.sdoc".to_string(), "Proc_1/Scene.sdoc".to_string()]
        );
    }
}
