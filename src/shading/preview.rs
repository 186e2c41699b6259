//! Preview surface dialect, understood by every viewer.

use super::{
    connect, define_shader, diffuse_source, write_transfer_function, MaterialData,
    ShadingBackend, ShadingBackendKind, SurfaceNodes, VolumeShading,
};
use crate::document::{Layer, PrimPath, Value, ValueType, WriteTime};

const SURFACE_NODE: &str = "PreviewSurface";
const VOLUME_NODE: &str = "PreviewVolume";
const SURFACE_TERMINAL: &str = "outputs:surface";
const VOLUME_TERMINAL: &str = "outputs:volume";

const INPUTS: &[(&str, ValueType)] = &[
    ("inputs:diffuseColor", ValueType::Float3),
    ("inputs:opacity", ValueType::Float),
    ("inputs:emissiveColor", ValueType::Float3),
    ("inputs:roughness", ValueType::Float),
    ("inputs:metallic", ValueType::Float),
    ("inputs:ior", ValueType::Float),
];

/// Writes `UsdPreviewSurface`-style shaders.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviewSurfaceBackend;

impl ShadingBackend for PreviewSurfaceBackend {
    fn kind(&self) -> ShadingBackendKind {
        ShadingBackendKind::Preview
    }

    fn create_surface_shader(&self, layer: &mut Layer, material: &PrimPath) -> PrimPath {
        let shader = material.child(SURFACE_NODE);
        define_shader(layer, &shader, "UsdPreviewSurface");
        layer.set_relationship(material, SURFACE_TERMINAL, vec![shader.clone()]);
        shader
    }

    fn update_surface_shader(
        &self,
        layer: &mut Layer,
        nodes: &SurfaceNodes,
        data: &MaterialData,
        when: WriteTime,
    ) {
        let s = &nodes.shader;
        let emissive = data.emissive.map(|c| c * data.emissive_intensity);
        layer.write(s, "inputs:diffuseColor", ValueType::Float3, when, Value::Float3(data.diffuse));
        layer.write(s, "inputs:opacity", ValueType::Float, when, Value::Float(data.opacity));
        layer.write(s, "inputs:emissiveColor", ValueType::Float3, when, Value::Float3(emissive));
        layer.write(s, "inputs:roughness", ValueType::Float, when, Value::Float(data.roughness));
        layer.write(s, "inputs:metallic", ValueType::Float, when, Value::Float(data.metallic));
        layer.write(s, "inputs:ior", ValueType::Float, when, Value::Float(data.ior));
        connect(layer, s, "inputs:diffuseColor", diffuse_source(nodes, data));
    }

    fn create_volume_shader(
        &self,
        layer: &mut Layer,
        material: &PrimPath,
        volume: &VolumeShading<'_>,
        when: WriteTime,
    ) -> PrimPath {
        let shader = material.child(VOLUME_NODE);
        define_shader(layer, &shader, "PreviewVolume");
        layer.set_relationship(material, VOLUME_TERMINAL, vec![shader.clone()]);
        write_transfer_function(layer, &shader, volume.transfer_function, when);
        layer.set_default(
            &shader,
            "inputs:fields",
            ValueType::TokenArray,
            Value::TokenArray(volume.fields.to_vec()),
        );
        shader
    }

    fn surface_inputs(&self) -> &'static [(&'static str, ValueType)] {
        INPUTS
    }
}
