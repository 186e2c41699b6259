//! Materials and textures.
//!
//! Materials live in the actor document under `Materials/`. Each carries the
//! shared reader nodes plus one surface shader per configured backend.
//! Texture images are PNG files under `textures/`, referenced from the
//! diffuse texture reader of every material using them.

use super::{actor_mut, SceneWriter, TextureData};
use crate::cache::{texture_file, TextureRecord};
use crate::document::{Layer, WriteTime};
use crate::shading::{
    define_reader_nodes, write_texture_reader, MaterialData, ReaderNodes, ShadingBackend, SurfaceNodes,
};
use crate::util::{EntityId, TimeCode};

const TEXTURE_FILE_INPUT: &str = "inputs:file";

fn write_time(time_varying: bool, time: TimeCode) -> WriteTime {
    if time_varying {
        WriteTime::At(time)
    } else {
        WriteTime::Default
    }
}

/// Point a material's texture reader at the image of `time`.
fn refresh_texture_reader(layer: &mut Layer, readers: &ReaderNodes, texture: &TextureRecord, time: TimeCode) {
    if let Some(file) = texture.file_at(time) {
        write_texture_reader(
            layer,
            &readers.texture,
            file,
            write_time(texture.time_varying, time),
            texture.wrap,
        );
    }
}

fn backend_for<'b>(
    backends: &'b [Box<dyn ShadingBackend>],
    kind: crate::shading::ShadingBackendKind,
) -> Option<&'b dyn ShadingBackend> {
    backends.iter().find(|b| b.kind() == kind).map(|b| b.as_ref())
}

impl SceneWriter {
    /// Write one material time step.
    pub fn update_material(&mut self, actor: EntityId, id: EntityId, time: TimeCode, data: &MaterialData) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("update material") else {
            return false;
        };
        ctx.widen_time_range(time);
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);

        let texture = data.diffuse_texture.and_then(|t| cache.texture(t).cloned());
        if let (Some(t), None) = (data.diffuse_texture, &texture) {
            ctx.logger.warn(format!(
                "material {} reads texture {} which has not been written",
                id, t
            ));
        }

        let backends = ctx.backends;
        let (is_new, record) = cache.get_or_create_material(id);
        let layer = ctx.edit(&actor_doc);
        if is_new {
            layer.define_prim(&record.path, Some("Material"));
            record.readers = Some(define_reader_nodes(layer, &record.path));
            for backend in backends {
                let shader = backend.create_surface_shader(layer, &record.path);
                record.shaders.push((backend.kind(), shader));
            }
        } else if record.time_varying != data.time_varying {
            // A policy flip invalidates both the default and the samples.
            for (kind, shader) in &record.shaders {
                if let Some(backend) = backend_for(backends, *kind) {
                    for (input, _) in backend.surface_inputs() {
                        layer.remove_attribute(shader, input);
                    }
                }
            }
        }
        record.time_varying = data.time_varying;
        record.texture = data.diffuse_texture;

        let Some(readers) = record.readers.clone() else {
            return false;
        };
        if let Some(texture) = &texture {
            refresh_texture_reader(layer, &readers, texture, time);
        }

        let when = write_time(data.time_varying, time);
        for (kind, shader) in &record.shaders {
            let Some(backend) = backend_for(backends, *kind) else {
                continue;
            };
            let nodes = SurfaceNodes {
                material: record.path.clone(),
                shader: shader.clone(),
                vertex_colors: readers.vertex_colors.clone(),
                texture: readers.texture.clone(),
            };
            backend.update_surface_shader(layer, &nodes, data, when);
        }
        true
    }

    /// Remove a material and unbind every geometry using it.
    pub fn delete_material(&mut self, actor: EntityId, id: EntityId) -> bool {
        self.with_live_suspended(|w| w.delete_material_now(actor, id))
    }

    fn delete_material_now(&mut self, actor: EntityId, id: EntityId) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("delete material") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);
        let Some(record) = cache.remove_material(id) else {
            panic!("unknown material id {} on actor {}", id, actor);
        };

        let layer = ctx.edit(&actor_doc);
        layer.remove_prim(&record.path);
        for geom in cache.geoms_mut() {
            if geom.material == Some(id) {
                layer.set_relationship(&geom.path, "material:binding", Vec::new());
                geom.material = None;
            }
        }
        ctx.logger.info(format!("removed material {}", record.path));
        true
    }

    /// Write one texture image.
    ///
    /// Time-varying textures get a time-stamped file per step; static ones
    /// overwrite a single file. Materials reading the texture are refreshed.
    pub fn update_texture(&mut self, actor: EntityId, id: EntityId, time: TimeCode, data: &TextureData<'_>) -> bool {
        let bytes = match data.encode_png() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.logger
                    .error(format!("texture {} on actor {}: {}", id, actor, e));
                return false;
            }
        };
        let Some((mut ctx, actors)) = self.connected_parts("update texture") else {
            return false;
        };
        ctx.widen_time_range(time);
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);

        let rel = texture_file(&cache.name, id, data.time_varying.then_some(time));
        let ok = ctx.conn.write_file(&bytes, &ctx.layout.store_path(&rel), true);
        if !ok {
            ctx.logger.error(format!("cannot write texture '{}'", rel));
        }

        let (is_new, record) = cache.get_or_create_texture(id);
        let flipped = !is_new && record.time_varying != data.time_varying;
        record.wrap = data.wrap;
        record.time_varying = data.time_varying;
        if data.time_varying {
            if !record.time_files.iter().any(|(t, _)| *t == time) {
                record.time_files.push((time, rel));
            }
        } else {
            record.has_default = true;
        }
        let texture = record.clone();

        for material in cache.materials_using_texture(id) {
            let Some(readers) = cache.material(material).and_then(|m| m.readers.clone()) else {
                continue;
            };
            let layer = ctx.edit(&actor_doc);
            if flipped {
                layer.remove_attribute(&readers.texture, TEXTURE_FILE_INPUT);
            }
            refresh_texture_reader(layer, &readers, &texture, time);
        }
        ok
    }

    /// Remove a texture with every image written for it.
    pub fn delete_texture(&mut self, actor: EntityId, id: EntityId) -> bool {
        self.with_live_suspended(|w| w.delete_texture_now(actor, id))
    }

    fn delete_texture_now(&mut self, actor: EntityId, id: EntityId) -> bool {
        let Some((mut ctx, actors)) = self.connected_parts("delete texture") else {
            return false;
        };
        let cache = actor_mut(actors, actor);
        let actor_doc = ctx.actor_document(cache);
        let Some(record) = cache.remove_texture(id) else {
            panic!("unknown texture id {} on actor {}", id, actor);
        };

        let mut ok = true;
        for file in record.files() {
            ok &= ctx.remove_file(&ctx.layout.store_path(&file));
        }
        for material in cache.materials_using_texture(id) {
            let (_, m) = cache.get_or_create_material(material);
            m.texture = None;
            if let Some(readers) = &m.readers {
                ctx.edit(&actor_doc)
                    .remove_attribute(&readers.texture, TEXTURE_FILE_INPUT);
            }
        }
        ctx.logger.info(format!("removed texture {} of actor {}", id, actor));
        ok
    }
}
