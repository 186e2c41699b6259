//! Volume updates: grid files, field prims and the private shading graph.

use glam::DVec3;

use super::attributes::AttrWrite;
use super::geom::GeomSite;
use super::{actor_mut, Ctx, SceneWriter, VolumeInput};
use crate::cache::{
    actor_document, clip_document, relative_path, sanitize_name, volume_grid_file,
    volume_material_path, GeomKind, GeomRecord,
};
use crate::document::{PrimPath, Value, ValueType, WriteTime};
use crate::shading::VolumeShading;
use crate::util::{ContentKey, EntityId, TimeCode};
use crate::volume::{TransferFunction, VolumeData};

const FIELD_PRIM_TYPE: &str = "VolumeField";

fn field_relationship(grid: &str) -> String {
    format!("field:{}", grid)
}

/// `[origin, origin + dims * spacing]`
fn volume_extent(data: &VolumeData<'_>) -> [[f32; 3]; 2] {
    let origin = DVec3::from_array(data.origin);
    let size = DVec3::new(data.dims[0] as f64, data.dims[1] as f64, data.dims[2] as f64)
        * DVec3::from_array(data.spacing);
    [origin.as_vec3().to_array(), (origin + size).as_vec3().to_array()]
}

/// Author grids, fields and shading of one volume time step. Returns the
/// attribute writes routed through the clip machinery.
fn volume_writes(
    ctx: &mut Ctx<'_>,
    site: &GeomSite<'_>,
    record: &mut GeomRecord,
    input: &VolumeInput<'_>,
) -> Vec<AttrWrite> {
    let tv = input.time_varying;
    let grid_rel = volume_grid_file(site.actor, record.id, tv.then_some(site.time));
    match ctx.voxelizer.grid_file_bytes(&input.data) {
        Some(bytes) => {
            if !ctx.conn.write_file(&bytes, &ctx.layout.store_path(&grid_rel), true) {
                ctx.logger.error(format!("cannot write voxel grid '{}'", grid_rel));
            }
        }
        None => ctx
            .logger
            .error(format!("{} at {}: volume could not be voxelized", record.path, site.time)),
    }

    // Asset paths resolve against the document holding the value.
    let anchor = if tv {
        clip_document(site.actor, GeomKind::Volume, record.id, site.time)
    } else {
        actor_document(site.actor)
    };
    let file_path = relative_path(&anchor, &grid_rel);

    let grids = input.data.grid_names();
    let backends = ctx.backends;
    let manifest = ctx.layout.store_path(&record.manifest);

    let stale: Vec<String> = record
        .fields
        .iter()
        .filter(|f| !grids.contains(f))
        .cloned()
        .collect();
    for grid in &stale {
        let field = record.path.child(&sanitize_name(grid));
        let layer = ctx.edit(site.actor_doc);
        layer.remove_prim(&field);
        layer.set_relationship(&record.path, &field_relationship(grid), Vec::new());
        ctx.edit(&manifest).remove_prim(&field);
        record.attributes.forget(&format!("{}.filePath", grid));
    }

    let layer = ctx.edit(site.actor_doc);
    let mut fields: Vec<PrimPath> = Vec::with_capacity(grids.len());
    for grid in &grids {
        let field = record.path.child(&sanitize_name(grid));
        layer.define_prim(&field, Some(FIELD_PRIM_TYPE));
        layer.set_default(&field, "fieldName", ValueType::Token, Value::Token(grid.clone()));
        layer.set_relationship(&record.path, &field_relationship(grid), vec![field.clone()]);
        fields.push(field);
    }
    record.fields = grids.clone();

    let fallback = TransferFunction::default();
    let shading = VolumeShading {
        transfer_function: input.data.transfer_function.unwrap_or(&fallback),
        fields: &grids,
    };
    let when = if tv { WriteTime::At(site.time) } else { WriteTime::Default };
    let material = volume_material_path(site.actor, record.id);
    layer.define_prim(&material, Some("Material"));
    for backend in backends {
        backend.create_volume_shader(layer, &material, &shading, when);
    }
    layer.set_relationship(&record.path, "material:binding", vec![material]);

    let extent = volume_extent(&input.data);
    let mut writes = vec![AttrWrite::pod(
        &record.path,
        "extent",
        ValueType::Float3Array,
        Some(&extent[..]),
        Value::Float3Array,
    )
    .time_varying(tv)];
    for (grid, field) in grids.iter().zip(&fields) {
        writes.push(
            AttrWrite::new(field, "filePath", ValueType::Asset, Some(Value::Asset(file_path.clone())))
                .content(ContentKey::from_bytes(file_path.as_bytes()))
                .keyed(format!("{}.filePath", grid))
                .time_varying(tv),
        );
    }
    writes
}

impl SceneWriter {
    /// Write one volume time step.
    ///
    /// The dense data is voxelized into a grid file under `volumes/`, one
    /// field prim per grid references it and the private volume material
    /// is rebuilt from the transfer function.
    pub fn update_volume(&mut self, actor: EntityId, id: EntityId, time: TimeCode, input: &VolumeInput<'_>) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("update volume") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        ctx.write_geom(cache, GeomKind::Volume, id, time, None, &[], false, |ctx, site, record| {
            volume_writes(ctx, site, record, input)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeArray;

    #[test]
    fn test_volume_extent() {
        let values = [0u8; 8];
        let data = VolumeData {
            data: VolumeArray::Uint8(&values),
            components: 1,
            dims: [2, 2, 2],
            spacing: [0.5, 1.0, 2.0],
            origin: [1.0, 0.0, -1.0],
            background_index: None,
            channel: "density",
            transfer_function: None,
            pre_classified: false,
        };
        assert_eq!(volume_extent(&data), [[1.0, 0.0, -1.0], [2.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_field_relationship_name() {
        assert_eq!(field_relationship("density"), "field:density");
    }
}
