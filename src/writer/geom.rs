//! Geometry updates and removal.
//!
//! Every update follows the same protocol: resolve the record, create the
//! structural prim and manifest on first use, pick the clip of the current
//! time step, run the attribute writes, re-apply the material binding and
//! persist the clip, manifest and clip metadata.

use glam::Quat;

use super::attributes::{extent_write, primvar_name, AttrWrite};
use super::{actor_mut, Ctx, SceneWriter, VISIBILITY};
use super::{CurveData, GenericArray, InstanceShape, InstancerData, MeshData};
use crate::cache::{
    canonical_document, clip_document, is_live_document, live_document, material_prim_path,
    sanitize_name, volume_grid_file, ActorCache, AttributeTracker, GeomAttrs, GeomKind, GeomRecord,
    PROTOTYPES_SCOPE,
};
use crate::clips::ClipLedger;
use crate::document::{Layer, PrimPath, Value, ValueType};
use crate::live::migrate_clip_to_live;
use crate::util::{ContentKey, EntityId, Logger, TimeCode};

/// Time of the sample hiding a geometry before its first update.
const BEFORE_FIRST_SAMPLE: TimeCode = f64::MIN;

const MATERIAL_BINDING: &str = "material:binding";

fn visibility(visible: bool) -> Value {
    Value::Token(if visible { "inherited" } else { "invisible" }.into())
}

/// Where a geometry update lands.
pub(crate) struct GeomSite<'s> {
    pub actor: &'s str,
    pub actor_doc: &'s str,
    pub time: TimeCode,
}

fn unknown_geom(actor: EntityId, kind: GeomKind, id: EntityId) -> ! {
    panic!("unknown {} id {} on actor {}", kind.entity_kind(), id, actor)
}

impl Ctx<'_> {
    /// Define the prim and manifest of a new geometry.
    ///
    /// A geometry that already exists in a reopened session gets its clip
    /// ledger back from the persisted clip metadata.
    fn init_geom(&mut self, actor_doc: &str, record: &mut GeomRecord) {
        let doc = self.docs.open_or_create(self.conn, actor_doc);
        let persisted = doc
            .delta
            .as_ref()
            .and_then(|d| d.prim(&record.path))
            .and_then(|p| p.clips.clone())
            .or_else(|| doc.layer.prim(&record.path).and_then(|p| p.clips.clone()));
        if let Some(clips) = persisted {
            record.ledger = ClipLedger::from_clip_set(&clips, is_live_document);
            self.logger.info(format!(
                "{} resumes with {} clip(s)",
                record.path,
                record.ledger.len()
            ));
        }

        let prim_type = record.prim_type();
        let layer = self.edit(actor_doc);
        layer.define_prim(&record.path, Some(prim_type));
        if record.ledger.is_empty() {
            layer.set_sample(
                &record.path,
                VISIBILITY,
                ValueType::Token,
                BEFORE_FIRST_SAMPLE,
                visibility(false),
            );
        }
        let manifest = self.layout.store_path(&record.manifest);
        self.edit(&manifest).define_prim(&record.path, Some(prim_type));
    }

    /// Clip of `time`, created in the ledger when missing. Returns the
    /// scene-relative path and whether the clip is new.
    fn clip_for_time(&mut self, actor: &str, record: &mut GeomRecord, time: TimeCode) -> Option<(String, bool)> {
        if let Some(index) = record.ledger.find(time) {
            if self.live && !migrate_clip_to_live(self.conn, self.layout, &mut record.ledger, index) {
                self.logger.warn(format!("cannot migrate clip of {} at {} to live", record.path, time));
            }
            return record.ledger.asset(index).map(|a| (a.path.clone(), false));
        }
        let canonical = clip_document(actor, record.kind, record.id, time);
        if self.live {
            let live = live_document(&canonical);
            let (_, index) = record.ledger.insert(time, &live);
            record.ledger.set_asset_path(index, live.clone(), true);
            Some((live, true))
        } else {
            record.ledger.insert(time, &canonical);
            Some((canonical, true))
        }
    }

    /// Run one geometry update.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn write_geom(
        &mut self,
        actor: &mut ActorCache,
        kind: GeomKind,
        id: EntityId,
        time: TimeCode,
        material: Option<EntityId>,
        deleted: &[&str],
        alternate_rep: bool,
        build: impl FnOnce(&mut Ctx<'_>, &GeomSite<'_>, &mut GeomRecord) -> Vec<AttrWrite>,
    ) -> bool {
        self.widen_time_range(time);
        let actor_doc = self.actor_document(actor);
        let actor_name = actor.name.clone();
        let timeline = actor.timeline.clone();

        let (is_new, record) = actor.get_or_create_geom(kind, id);
        if is_new {
            record.uses_alternate_rep = alternate_rep;
            self.init_geom(&actor_doc, record);
        }

        let Some((clip_rel, new_clip)) = self.clip_for_time(&actor_name, record, time) else {
            return false;
        };
        let clip_path = self.layout.store_path(&clip_rel);
        let mut clip = if new_clip {
            Layer::new()
        } else {
            self.docs.load(self.conn, &clip_path).unwrap_or_default()
        };
        clip.prim_entry(&record.path);

        self.edit(&actor_doc).set_sample(
            &record.path,
            VISIBILITY,
            ValueType::Token,
            time,
            visibility(true),
        );

        self.delete_generic_arrays(&actor_doc, record, &mut clip, deleted);
        let site = GeomSite {
            actor: &actor_name,
            actor_doc: &actor_doc,
            time,
        };
        let writes = build(self, &site, record);
        self.apply_writes(&actor_doc, record, &mut clip, time, writes);

        if !kind.uses_private_material() && (is_new || record.material != material) {
            let targets = material
                .map(|m| vec![material_prim_path(&actor_name, m)])
                .unwrap_or_default();
            self.edit(&actor_doc)
                .set_relationship(&record.path, MATERIAL_BINDING, targets);
            record.material = material;
        }

        let mut ok = self.docs.write_layer(self.conn, &clip_path, &clip);
        let manifest = self.layout.store_path(&record.manifest);
        if self.docs.get(&manifest).is_some_and(|d| d.is_dirty()) {
            ok &= self.docs.save(self.conn, &manifest);
        }
        self.write_clip_set(&actor_doc, &timeline, record);
        if !ok {
            self.logger
                .error(format!("update of {} at {} was not fully written", record.path, time));
        }
        ok
    }

    /// Delete every file a geometry owns and close its manifest.
    pub(crate) fn remove_geom_files(&mut self, actor: &str, record: &GeomRecord) -> bool {
        let mut ok = true;
        for path in record.ledger.alive_paths() {
            ok &= self.remove_file(&self.layout.store_path(path));
            if is_live_document(path) {
                ok &= self.remove_file(&self.layout.store_path(&canonical_document(path)));
            }
        }
        if record.kind == GeomKind::Volume {
            for time in record.ledger.times() {
                ok &= self.remove_file(&self.layout.store_path(&volume_grid_file(actor, record.id, Some(time))));
            }
            ok &= self.remove_file(&self.layout.store_path(&volume_grid_file(actor, record.id, None)));
        }
        let manifest = self.layout.store_path(&record.manifest);
        self.docs.close(&manifest);
        ok &= self.remove_file(&manifest);
        ok
    }
}

fn flag(data: GeomAttrs, attr: GeomAttrs) -> bool {
    data.contains(attr)
}

/// Writes of the caller's generic arrays. Arrays of unsupported element
/// types are logged and skipped.
fn generic_writes(prim: &PrimPath, generic: &[GenericArray<'_>], logger: &Logger, out: &mut Vec<AttrWrite>) {
    for array in generic {
        let value = match array.data.to_value() {
            Ok(v) => v,
            Err(e) => {
                logger.warn(format!("generic array '{}' on {} skipped: {}", array.name, prim, e));
                continue;
            }
        };
        let Some(value_type) = value.value_type() else {
            continue;
        };
        let name = primvar_name(&sanitize_name(array.name));
        out.push(
            AttrWrite::new(prim, &name, value_type, Some(value))
                .content(array.data.content_key())
                .interpolation(array.interpolation)
                .time_varying(array.time_varying),
        );
    }
}

fn mesh_writes(prim: &PrimPath, data: &MeshData<'_>, generic: &[GenericArray<'_>], logger: &Logger) -> Vec<AttrWrite> {
    let tv = data.time_varying;
    let counts = match data.face_vertex_counts {
        Some(c) => c.to_vec(),
        None => vec![3; data.face_vertex_indices.len() / 3],
    };
    let mut writes = vec![
        AttrWrite::pod(prim, "points", ValueType::Float3Array, Some(data.points), Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::POINTS)),
        extent_write(prim, data.points, flag(tv, GeomAttrs::POINTS)),
        AttrWrite::pod(
            prim,
            "faceVertexIndices",
            ValueType::IntArray,
            Some(data.face_vertex_indices),
            Value::IntArray,
        )
        .time_varying(flag(tv, GeomAttrs::INDICES)),
        AttrWrite::pod(prim, "faceVertexCounts", ValueType::IntArray, Some(&counts[..]), Value::IntArray)
            .time_varying(flag(tv, GeomAttrs::INDICES)),
        AttrWrite::pod(prim, "normals", ValueType::Float3Array, data.normals, Value::Float3Array)
            .interpolation(data.normals_interpolation)
            .time_varying(flag(tv, GeomAttrs::NORMALS)),
        AttrWrite::pod(prim, "primvars:st", ValueType::Float2Array, data.tex_coords, Value::Float2Array)
            .interpolation(data.tex_coords_interpolation)
            .time_varying(flag(tv, GeomAttrs::TEX_COORDS)),
        AttrWrite::pod(
            prim,
            "primvars:displayColor",
            ValueType::Float3Array,
            data.colors,
            Value::Float3Array,
        )
        .interpolation(data.colors_interpolation)
        .time_varying(flag(tv, GeomAttrs::COLORS)),
    ];
    generic_writes(prim, generic, logger, &mut writes);
    writes
}

fn curve_writes(prim: &PrimPath, data: &CurveData<'_>, generic: &[GenericArray<'_>], logger: &Logger) -> Vec<AttrWrite> {
    let tv = data.time_varying;
    let mut writes = vec![
        AttrWrite::new(prim, "type", ValueType::Token, Some(Value::Token("linear".into())))
            .content(ContentKey::from_bytes(b"linear")),
        AttrWrite::pod(prim, "points", ValueType::Float3Array, Some(data.points), Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::POINTS)),
        extent_write(prim, data.points, flag(tv, GeomAttrs::POINTS)),
        AttrWrite::pod(
            prim,
            "curveVertexCounts",
            ValueType::IntArray,
            Some(data.curve_vertex_counts),
            Value::IntArray,
        )
        .time_varying(flag(tv, GeomAttrs::CURVE_COUNTS)),
        AttrWrite::pod(prim, "widths", ValueType::FloatArray, data.widths, Value::FloatArray)
            .interpolation(data.widths_interpolation)
            .time_varying(flag(tv, GeomAttrs::WIDTHS)),
        AttrWrite::pod(
            prim,
            "primvars:displayColor",
            ValueType::Float3Array,
            data.colors,
            Value::Float3Array,
        )
        .interpolation(data.colors_interpolation)
        .time_varying(flag(tv, GeomAttrs::COLORS)),
        AttrWrite::pod(prim, "primvars:st", ValueType::Float2Array, data.tex_coords, Value::Float2Array)
            .time_varying(flag(tv, GeomAttrs::TEX_COORDS)),
    ];
    generic_writes(prim, generic, logger, &mut writes);
    writes
}

fn normalized_orientations(orientations: &[[f32; 4]]) -> Vec<[f32; 4]> {
    orientations
        .iter()
        .map(|q| {
            let q = Quat::from_array(*q);
            if q.length_squared() > 0.0 {
                q.normalize().to_array()
            } else {
                Quat::IDENTITY.to_array()
            }
        })
        .collect()
}

fn instancer_writes(
    prim: &PrimPath,
    data: &InstancerData<'_>,
    generic: &[GenericArray<'_>],
    logger: &Logger,
) -> Vec<AttrWrite> {
    let tv = data.time_varying;
    let orientations = data.orientations.map(normalized_orientations);
    let proto_indices = match data.proto_indices {
        Some(p) => p.to_vec(),
        None => vec![0; data.positions.len()],
    };
    let mut writes = vec![
        AttrWrite::pod(prim, "positions", ValueType::Float3Array, Some(data.positions), Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::POINTS)),
        extent_write(prim, data.positions, flag(tv, GeomAttrs::POINTS)),
        AttrWrite::pod(prim, "scales", ValueType::Float3Array, data.scales, Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::SCALES)),
        AttrWrite::pod(
            prim,
            "orientations",
            ValueType::QuatArray,
            orientations.as_deref(),
            Value::QuatArray,
        )
        .time_varying(flag(tv, GeomAttrs::ORIENTATIONS)),
        AttrWrite::pod(prim, "protoIndices", ValueType::IntArray, Some(&proto_indices[..]), Value::IntArray)
            .time_varying(flag(tv, GeomAttrs::PROTO_INDICES)),
        AttrWrite::pod(prim, "velocities", ValueType::Float3Array, data.velocities, Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::VELOCITIES)),
        AttrWrite::pod(prim, "invisibleIds", ValueType::Int64Array, data.invisible_ids, Value::Int64Array)
            .time_varying(flag(tv, GeomAttrs::INVISIBLE_IDS)),
        AttrWrite::pod(prim, "ids", ValueType::Int64Array, data.instance_ids, Value::Int64Array)
            .time_varying(flag(tv, GeomAttrs::INSTANCE_IDS)),
        AttrWrite::pod(
            prim,
            "primvars:displayColor",
            ValueType::Float3Array,
            data.colors,
            Value::Float3Array,
        )
        .interpolation(crate::document::Interpolation::Vertex)
        .time_varying(flag(tv, GeomAttrs::COLORS)),
    ];
    generic_writes(prim, generic, logger, &mut writes);
    writes
}

/// Instancer written as a point set; sphere diameters come from the x scale.
fn points_writes(
    prim: &PrimPath,
    data: &InstancerData<'_>,
    generic: &[GenericArray<'_>],
    logger: &Logger,
) -> Vec<AttrWrite> {
    let tv = data.time_varying;
    let widths: Option<Vec<f32>> = data.scales.map(|s| s.iter().map(|v| 2.0 * v[0]).collect());
    let mut writes = vec![
        AttrWrite::pod(prim, "points", ValueType::Float3Array, Some(data.positions), Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::POINTS)),
        extent_write(prim, data.positions, flag(tv, GeomAttrs::POINTS)),
        AttrWrite::pod(prim, "widths", ValueType::FloatArray, widths.as_deref(), Value::FloatArray)
            .interpolation(crate::document::Interpolation::Vertex)
            .time_varying(flag(tv, GeomAttrs::SCALES)),
        AttrWrite::pod(prim, "velocities", ValueType::Float3Array, data.velocities, Value::Float3Array)
            .time_varying(flag(tv, GeomAttrs::VELOCITIES)),
        AttrWrite::pod(prim, "ids", ValueType::Int64Array, data.instance_ids, Value::Int64Array)
            .time_varying(flag(tv, GeomAttrs::INSTANCE_IDS)),
        AttrWrite::pod(
            prim,
            "primvars:displayColor",
            ValueType::Float3Array,
            data.colors,
            Value::Float3Array,
        )
        .interpolation(crate::document::Interpolation::Vertex)
        .time_varying(flag(tv, GeomAttrs::COLORS)),
    ];
    generic_writes(prim, generic, logger, &mut writes);
    writes
}

/// Define one prototype shape at `path`.
fn define_prototype(layer: &mut Layer, path: &PrimPath, shape: InstanceShape) {
    match shape {
        InstanceShape::Sphere => {
            layer.define_prim(path, Some("Sphere"));
            layer.set_default(path, "radius", ValueType::Double, Value::Double(0.5));
        }
        InstanceShape::Cube => {
            layer.define_prim(path, Some("Cube"));
            layer.set_default(path, "size", ValueType::Double, Value::Double(1.0));
        }
        InstanceShape::Cylinder => {
            layer.define_prim(path, Some("Cylinder"));
            layer.set_default(path, "radius", ValueType::Double, Value::Double(0.5));
            layer.set_default(path, "height", ValueType::Double, Value::Double(1.0));
        }
        InstanceShape::Cone => {
            layer.define_prim(path, Some("Cone"));
            layer.set_default(path, "radius", ValueType::Double, Value::Double(0.5));
            layer.set_default(path, "height", ValueType::Double, Value::Double(1.0));
        }
        InstanceShape::Arrow => {
            layer.define_prim(path, Some("Xform"));
            let shaft = path.child("Shaft");
            layer.define_prim(&shaft, Some("Cylinder"));
            layer.set_default(&shaft, "radius", ValueType::Double, Value::Double(0.1));
            layer.set_default(&shaft, "height", ValueType::Double, Value::Double(0.7));
            let head = path.child("Head");
            layer.define_prim(&head, Some("Cone"));
            layer.set_default(&head, "radius", ValueType::Double, Value::Double(0.25));
            layer.set_default(&head, "height", ValueType::Double, Value::Double(0.3));
        }
    }
}

/// Author the prototypes of an instancer when its shape list changed.
fn write_prototypes(layer: &mut Layer, record: &mut GeomRecord, shapes: &[InstanceShape]) {
    if record.prototypes == shapes {
        return;
    }
    let scope = record.path.child(PROTOTYPES_SCOPE);
    if !record.prototypes.is_empty() {
        layer.remove_prim(&scope);
    }
    layer.define_prim(&scope, Some("Scope"));
    let targets: Vec<PrimPath> = shapes
        .iter()
        .map(|shape| {
            let path = scope.child(shape.prim_name());
            define_prototype(layer, &path, *shape);
            path
        })
        .collect();
    layer.set_relationship(&record.path, "prototypes", targets);
    record.prototypes = shapes.to_vec();
}

impl SceneWriter {
    /// Write one mesh time step.
    #[allow(clippy::too_many_arguments)]
    pub fn update_mesh(
        &mut self,
        actor: EntityId,
        id: EntityId,
        time: TimeCode,
        data: &MeshData<'_>,
        material: Option<EntityId>,
        generic: &[GenericArray<'_>],
        deleted: &[&str],
    ) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("update mesh") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        ctx.write_geom(cache, GeomKind::Mesh, id, time, material, deleted, false, |ctx, _, record| {
            mesh_writes(&record.path, data, generic, ctx.logger)
        })
    }

    /// Write one curve time step.
    #[allow(clippy::too_many_arguments)]
    pub fn update_curve(
        &mut self,
        actor: EntityId,
        id: EntityId,
        time: TimeCode,
        data: &CurveData<'_>,
        material: Option<EntityId>,
        generic: &[GenericArray<'_>],
        deleted: &[&str],
    ) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("update curve") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        ctx.write_geom(cache, GeomKind::Curve, id, time, material, deleted, false, |ctx, _, record| {
            curve_writes(&record.path, data, generic, ctx.logger)
        })
    }

    /// Write one instancer time step.
    ///
    /// A lone sphere prototype is written as a point set. Switching between
    /// the two representations retypes the prim with the live overlay
    /// suspended.
    #[allow(clippy::too_many_arguments)]
    pub fn update_instancer(
        &mut self,
        actor: EntityId,
        id: EntityId,
        time: TimeCode,
        data: &InstancerData<'_>,
        material: Option<EntityId>,
        generic: &[GenericArray<'_>],
        deleted: &[&str],
    ) -> bool {
        let alternate = data.uses_points_representation();
        let retype = self
            .actors
            .get(&actor)
            .and_then(|a| a.geom(GeomKind::Instancer, id))
            .is_some_and(|r| r.uses_alternate_rep != alternate);
        if retype && !self.with_live_suspended(|w| w.retype_instancer(actor, id, alternate)) {
            return false;
        }

        let Some((mut ctx, actors)) = self.connected_parts("update instancer") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        ctx.write_geom(
            cache,
            GeomKind::Instancer,
            id,
            time,
            material,
            deleted,
            alternate,
            |ctx, site, record| {
                if alternate {
                    points_writes(&record.path, data, generic, ctx.logger)
                } else {
                    write_prototypes(ctx.edit(site.actor_doc), record, data.shapes);
                    instancer_writes(&record.path, data, generic, ctx.logger)
                }
            },
        )
    }

    /// Replace an instancer prim by its other representation.
    fn retype_instancer(&mut self, actor: EntityId, id: EntityId, alternate: bool) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("retype instancer") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);
        let timeline = cache.timeline.clone();
        let Some(record) = cache.geom_mut(GeomKind::Instancer, id) else {
            unknown_geom(actor, GeomKind::Instancer, id);
        };
        record.uses_alternate_rep = alternate;
        let prim_type = record.prim_type();

        let kept_visibility = ctx.edit(&actor_doc).attribute(&record.path, VISIBILITY).cloned();
        let manifest = ctx.layout.store_path(&record.manifest);
        for doc in [actor_doc.as_str(), manifest.as_str()] {
            let layer = ctx.edit(doc);
            layer.remove_prim(&record.path);
            layer.define_prim(&record.path, Some(prim_type));
        }
        if let Some(vis) = kept_visibility {
            ctx.edit(&actor_doc)
                .prim_entry(&record.path)
                .attributes
                .insert(VISIBILITY.to_string(), vis);
        }

        let mut ok = true;
        let clips: Vec<String> = record.ledger.alive_paths().map(str::to_string).collect();
        for rel in clips {
            let path = ctx.layout.store_path(&rel);
            if let Some(mut clip) = ctx.docs.load(ctx.conn, &path) {
                clip.remove_prim(&record.path);
                clip.prim_entry(&record.path);
                ok &= ctx.docs.write_layer(ctx.conn, &path, &clip);
            }
        }
        record.attributes = AttributeTracker::new();
        record.prototypes.clear();
        record.material = None;
        ctx.write_clip_set(&actor_doc, &timeline, record);
        ok &= ctx.docs.save(ctx.conn, &manifest);
        ctx.logger.info(format!("{} retyped as {}", record.path, prim_type));
        ok
    }

    /// Remove the time step `time` of a geometry.
    ///
    /// The geometry is hidden at that time. Removing the last time step
    /// removes the geometry entirely.
    pub fn remove_geom_at_time(&mut self, actor: EntityId, kind: GeomKind, id: EntityId, time: TimeCode) -> bool {
        let (ok, emptied) = {
            let Some((mut ctx, actors)) = self.connected_parts("remove geometry time step") else {
                return false;
            };
            let cache = actor_mut(actors, actor);
            let actor_doc = ctx.actor_document(cache);
            let actor_name = cache.name.clone();
            let timeline = cache.timeline.clone();
            let Some(record) = cache.geom_mut(kind, id) else {
                unknown_geom(actor, kind, id);
            };

            let Some(removed) = record.ledger.remove_time(time) else {
                ctx.logger
                    .warn(format!("{} has no time step {} to remove", record.path, time));
                return false;
            };
            let mut ok = true;
            if !removed.still_referenced {
                ok &= ctx.remove_file(&ctx.layout.store_path(&removed.path));
                if is_live_document(&removed.path) {
                    ok &= ctx.remove_file(&ctx.layout.store_path(&canonical_document(&removed.path)));
                }
            }
            if kind == GeomKind::Volume {
                let grid = volume_grid_file(&actor_name, id, Some(time));
                ok &= ctx.remove_file(&ctx.layout.store_path(&grid));
            }

            let emptied = record.ledger.is_empty();
            if !emptied {
                ctx.edit(&actor_doc).set_sample(
                    &record.path,
                    VISIBILITY,
                    ValueType::Token,
                    time,
                    visibility(false),
                );
                ctx.write_clip_set(&actor_doc, &timeline, record);
            }
            (ok, emptied)
        };
        if emptied {
            return self.remove_geom(actor, kind, id) && ok;
        }
        ok
    }

    /// Remove a geometry with every clip and grid file it wrote.
    pub fn remove_geom(&mut self, actor: EntityId, kind: GeomKind, id: EntityId) -> bool {
        let known = match self.actors.get(&actor) {
            Some(a) => a.geom(kind, id).is_some(),
            None => panic!("unknown actor id {}", actor),
        };
        if !known {
            unknown_geom(actor, kind, id);
        }
        self.with_live_suspended(|w| w.remove_geom_now(actor, kind, id))
    }

    fn remove_geom_now(&mut self, actor: EntityId, kind: GeomKind, id: EntityId) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("remove geometry") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);
        let Some(record) = cache.remove_geom(kind, id) else {
            return false;
        };
        let mut ok = ctx.remove_geom_files(&cache.name, &record);
        ctx.edit(&actor_doc).remove_prim(&record.path);
        ok &= ctx.docs.save(ctx.conn, &actor_doc);
        ctx.logger.info(format!("removed {}", record.path));
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim() -> PrimPath {
        PrimPath::new("/Root/A/InstancerGeom_1").unwrap()
    }

    #[test]
    fn test_orientations_are_normalized() {
        let q = normalized_orientations(&[[0.0, 0.0, 0.0, 2.0], [0.0; 4]]);
        assert_eq!(q[0], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(q[1], Quat::IDENTITY.to_array());
    }

    #[test]
    fn test_mesh_defaults_to_triangles() {
        let points = [[0.0f32; 3]; 3];
        let indices = [0, 1, 2, 0, 2, 1];
        let data = MeshData {
            points: &points,
            face_vertex_indices: &indices,
            ..MeshData::default()
        };
        let writes = mesh_writes(&prim(), &data, &[], &Logger::tracing_only());
        let counts = writes.iter().find(|w| w.name == "faceVertexCounts").unwrap();
        assert_eq!(counts.value, Some(Value::IntArray(vec![3, 3])));
        let normals = writes.iter().find(|w| w.name == "normals").unwrap();
        assert!(normals.value.is_none());
    }

    #[test]
    fn test_points_widths_follow_scales() {
        let positions = [[0.0f32; 3]; 2];
        let scales = [[0.5f32, 1.0, 1.0], [2.0, 1.0, 1.0]];
        let data = InstancerData {
            positions: &positions,
            scales: Some(&scales),
            shapes: &[InstanceShape::Sphere],
            time_varying: GeomAttrs::SCALES,
            ..InstancerData::default()
        };
        let writes = points_writes(&prim(), &data, &[], &Logger::tracing_only());
        let widths = writes.iter().find(|w| w.name == "widths").unwrap();
        assert_eq!(widths.value, Some(Value::FloatArray(vec![1.0, 4.0])));
        assert!(widths.time_varying);
    }

    #[test]
    fn test_prototypes_rewritten_on_change() {
        let mut layer = Layer::new();
        let mut record = crate::cache::ActorCache::new(1, "A")
            .get_or_create_geom(GeomKind::Instancer, 1)
            .1
            .clone();
        write_prototypes(&mut layer, &mut record, &[InstanceShape::Cube, InstanceShape::Arrow]);
        let scope = record.path.child(PROTOTYPES_SCOPE);
        assert_eq!(layer.type_name(&scope.child("Arrow").child("Head")), Some("Cone"));

        write_prototypes(&mut layer, &mut record, &[InstanceShape::Cone]);
        assert!(!layer.has_prim(&scope.child("Cube")));
        let rel = &layer.prim(&record.path).unwrap().relationships["prototypes"];
        assert_eq!(rel, &vec![scope.child("Cone")]);
    }

    #[test]
    fn test_generic_arrays_skip_unsupported() {
        let ok = [1.0f32, 2.0];
        let bad = [1u64];
        let generic = [
            GenericArray {
                name: "temperature",
                data: crate::writer::ArrayInput::F32(&ok),
                interpolation: crate::document::Interpolation::Vertex,
                time_varying: true,
            },
            GenericArray {
                name: "ids",
                data: crate::writer::ArrayInput::U64(&bad),
                interpolation: crate::document::Interpolation::Vertex,
                time_varying: false,
            },
        ];
        let mut out = Vec::new();
        generic_writes(&prim(), &generic, &Logger::tracing_only(), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "primvars:temperature");
        assert!(out[0].time_varying);
    }
}
