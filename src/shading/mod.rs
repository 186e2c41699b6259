//! Shading graph construction.
//!
//! A material is a `Material` prim holding shader nodes. Reader nodes
//! (vertex colors, texture coordinates, diffuse texture) are shared by every
//! backend; each [`ShadingBackend`] adds its own surface shader node and
//! terminal. Backends are chosen at runtime from the writer settings.
//!
//! Input connections are authored as relationships named
//! `<input>:connect` targeting the source node.

mod preview;
mod standard_surface;

pub use preview::PreviewSurfaceBackend;
pub use standard_surface::StandardSurfaceBackend;

use serde::{Deserialize, Serialize};

use crate::document::{Layer, PrimPath, Value, ValueType, WriteTime};
use crate::util::EntityId;
use crate::volume::TransferFunction;

/// Selectable shading backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingBackendKind {
    Preview,
    StandardSurface,
}

impl ShadingBackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::StandardSurface => "standard_surface",
        }
    }

    pub fn create(self) -> Box<dyn ShadingBackend> {
        match self {
            Self::Preview => Box::new(PreviewSurfaceBackend),
            Self::StandardSurface => Box::new(StandardSurfaceBackend),
        }
    }
}

/// Instantiate the configured backends, dropping duplicates.
pub fn create_backends(kinds: &[ShadingBackendKind]) -> Vec<Box<dyn ShadingBackend>> {
    let mut seen = Vec::new();
    kinds
        .iter()
        .filter(|k| {
            if seen.contains(*k) {
                false
            } else {
                seen.push(**k);
                true
            }
        })
        .map(|k| k.create())
        .collect()
}

/// Texture addressing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
    Mirror,
    Black,
}

impl WrapMode {
    pub fn token(self) -> &'static str {
        match self {
            Self::Repeat => "repeat",
            Self::Clamp => "clamp",
            Self::Mirror => "mirror",
            Self::Black => "black",
        }
    }
}

/// Surface appearance of one material at one time step.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialData {
    pub diffuse: [f32; 3],
    pub opacity: f32,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub ior: f32,
    /// Take the diffuse color from the geometry's per-element colors.
    pub use_vertex_colors: bool,
    /// Texture (of the same actor) driving the diffuse color.
    pub diffuse_texture: Option<EntityId>,
    /// Write values as time samples instead of defaults.
    pub time_varying: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8],
            opacity: 1.0,
            emissive: [0.0; 3],
            emissive_intensity: 0.0,
            roughness: 0.5,
            metallic: 0.0,
            ior: 1.5,
            use_vertex_colors: false,
            diffuse_texture: None,
            time_varying: false,
        }
    }
}

/// Node paths of one material's surface graph for one backend.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceNodes {
    pub material: PrimPath,
    pub shader: PrimPath,
    pub vertex_colors: PrimPath,
    pub texture: PrimPath,
}

/// Shared reader nodes of a material.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderNodes {
    pub vertex_colors: PrimPath,
    pub tex_coords: PrimPath,
    pub texture: PrimPath,
}

/// Volume appearance inputs.
#[derive(Clone, Copy, Debug)]
pub struct VolumeShading<'a> {
    pub transfer_function: &'a TransferFunction,
    /// Field prims bound to the volume, by grid name.
    pub fields: &'a [String],
}

/// One shading dialect.
pub trait ShadingBackend: Send + Sync {
    fn kind(&self) -> ShadingBackendKind;

    /// Define the surface shader node under `material` and connect it to the
    /// material terminal. Returns the shader path.
    fn create_surface_shader(&self, layer: &mut Layer, material: &PrimPath) -> PrimPath;

    /// Author `data` onto the shader created by `create_surface_shader`.
    fn update_surface_shader(
        &self,
        layer: &mut Layer,
        nodes: &SurfaceNodes,
        data: &MaterialData,
        when: WriteTime,
    );

    /// Define or refresh the volume shader under `material`. Returns the
    /// shader path.
    fn create_volume_shader(
        &self,
        layer: &mut Layer,
        material: &PrimPath,
        volume: &VolumeShading<'_>,
        when: WriteTime,
    ) -> PrimPath;

    /// Surface inputs this backend authors, for resetting time samples.
    fn surface_inputs(&self) -> &'static [(&'static str, ValueType)];
}

pub const SHADER_ID: &str = "info:id";
pub const VERTEX_COLOR_READER: &str = "VertexColorReader";
pub const TEX_COORD_READER: &str = "TexCoordReader";
pub const DIFFUSE_TEXTURE: &str = "DiffuseTexture";

/// Name of the relationship connecting `input` to a source node.
pub fn connection_name(input: &str) -> String {
    format!("{}:connect", input)
}

/// Connect `input` on `node` to `source`, or disconnect it.
pub fn connect(layer: &mut Layer, node: &PrimPath, input: &str, source: Option<&PrimPath>) {
    let targets = source.map(|s| vec![s.clone()]).unwrap_or_default();
    layer.set_relationship(node, &connection_name(input), targets);
}

pub(crate) fn define_shader(layer: &mut Layer, path: &PrimPath, id: &str) {
    layer.define_prim(path, Some("Shader"));
    layer.set_default(path, SHADER_ID, ValueType::Token, Value::Token(id.into()));
}

/// Define the backend-independent reader nodes of a material.
pub fn define_reader_nodes(layer: &mut Layer, material: &PrimPath) -> ReaderNodes {
    let vertex_colors = material.child(VERTEX_COLOR_READER);
    define_shader(layer, &vertex_colors, "PrimvarReader_float3");
    layer.set_default(
        &vertex_colors,
        "inputs:varname",
        ValueType::Token,
        Value::Token("displayColor".into()),
    );

    let tex_coords = material.child(TEX_COORD_READER);
    define_shader(layer, &tex_coords, "PrimvarReader_float2");
    layer.set_default(
        &tex_coords,
        "inputs:varname",
        ValueType::Token,
        Value::Token("st".into()),
    );

    let texture = material.child(DIFFUSE_TEXTURE);
    define_shader(layer, &texture, "UVTexture");
    connect(layer, &texture, "inputs:st", Some(&tex_coords));

    ReaderNodes {
        vertex_colors,
        tex_coords,
        texture,
    }
}

/// Author the file and wrap modes of a texture reader node.
pub fn write_texture_reader(
    layer: &mut Layer,
    texture: &PrimPath,
    file: &str,
    when: WriteTime,
    wrap: [WrapMode; 2],
) {
    layer.write(texture, "inputs:file", ValueType::Asset, when, Value::Asset(file.into()));
    layer.set_default(
        texture,
        "inputs:wrapS",
        ValueType::Token,
        Value::Token(wrap[0].token().into()),
    );
    layer.set_default(
        texture,
        "inputs:wrapT",
        ValueType::Token,
        Value::Token(wrap[1].token().into()),
    );
}

/// Source node of the diffuse color, if any.
pub(crate) fn diffuse_source<'a>(nodes: &'a SurfaceNodes, data: &MaterialData) -> Option<&'a PrimPath> {
    if data.diffuse_texture.is_some() {
        Some(&nodes.texture)
    } else if data.use_vertex_colors {
        Some(&nodes.vertex_colors)
    } else {
        None
    }
}

/// Transfer function inputs shared by the volume shaders.
pub(crate) fn write_transfer_function(
    layer: &mut Layer,
    shader: &PrimPath,
    tf: &TransferFunction,
    when: WriteTime,
) {
    layer.write(
        shader,
        "inputs:domain",
        ValueType::Float2,
        when,
        Value::Float2([tf.value_range[0] as f32, tf.value_range[1] as f32]),
    );
    layer.write(
        shader,
        "inputs:colors",
        ValueType::Float3Array,
        when,
        Value::Float3Array(tf.colors.clone()),
    );
    layer.write(
        shader,
        "inputs:opacities",
        ValueType::FloatArray,
        when,
        Value::FloatArray(tf.opacities.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> PrimPath {
        PrimPath::new("/Root/Actor/Materials/Material_3").unwrap()
    }

    #[test]
    fn test_create_backends_dedups() {
        let backends = create_backends(&[
            ShadingBackendKind::Preview,
            ShadingBackendKind::StandardSurface,
            ShadingBackendKind::Preview,
        ]);
        let kinds: Vec<_> = backends.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec![ShadingBackendKind::Preview, ShadingBackendKind::StandardSurface]);
    }

    #[test]
    fn test_reader_nodes() {
        let mut layer = Layer::new();
        let readers = define_reader_nodes(&mut layer, &material());
        assert_eq!(layer.type_name(&readers.texture), Some("Shader"));
        let st = layer.prim(&readers.texture).unwrap();
        assert_eq!(st.relationships["inputs:st:connect"], vec![readers.tex_coords.clone()]);

        write_texture_reader(
            &mut layer,
            &readers.texture,
            "textures/Actor_Texture_1.png",
            WriteTime::Default,
            [WrapMode::Clamp, WrapMode::Repeat],
        );
        let wrap = layer.attribute(&readers.texture, "inputs:wrapS").unwrap();
        assert_eq!(wrap.default, Some(Value::Token("clamp".into())));
    }

    #[test]
    fn test_diffuse_source_priority() {
        let m = material();
        let nodes = SurfaceNodes {
            material: m.clone(),
            shader: m.child("PreviewSurface"),
            vertex_colors: m.child(VERTEX_COLOR_READER),
            texture: m.child(DIFFUSE_TEXTURE),
        };
        let mut data = MaterialData {
            use_vertex_colors: true,
            ..MaterialData::default()
        };
        assert_eq!(diffuse_source(&nodes, &data), Some(&nodes.vertex_colors));
        data.diffuse_texture = Some(4);
        assert_eq!(diffuse_source(&nodes, &data), Some(&nodes.texture));
        data = MaterialData::default();
        assert_eq!(diffuse_source(&nodes, &data), None);
    }
}
