//! Autodesk Standard Surface dialect.
//!
//! Parameter names follow the Standard Surface shading model; the material
//! terminals live in the `mtlx` render context.

use super::{
    connect, define_shader, diffuse_source, write_transfer_function, MaterialData,
    ShadingBackend, ShadingBackendKind, SurfaceNodes, VolumeShading,
};
use crate::document::{Layer, PrimPath, Value, ValueType, WriteTime};

const SURFACE_NODE: &str = "StandardSurface";
const VOLUME_NODE: &str = "StandardVolume";
const SURFACE_TERMINAL: &str = "outputs:mtlx:surface";
const VOLUME_TERMINAL: &str = "outputs:mtlx:volume";

const INPUTS: &[(&str, ValueType)] = &[
    ("inputs:base", ValueType::Float),
    ("inputs:base_color", ValueType::Float3),
    ("inputs:opacity", ValueType::Float3),
    ("inputs:emission", ValueType::Float),
    ("inputs:emission_color", ValueType::Float3),
    ("inputs:specular_roughness", ValueType::Float),
    ("inputs:metalness", ValueType::Float),
    ("inputs:specular_IOR", ValueType::Float),
];

/// Writes `ND_standard_surface_surfaceshader` nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardSurfaceBackend;

impl ShadingBackend for StandardSurfaceBackend {
    fn kind(&self) -> ShadingBackendKind {
        ShadingBackendKind::StandardSurface
    }

    fn create_surface_shader(&self, layer: &mut Layer, material: &PrimPath) -> PrimPath {
        let shader = material.child(SURFACE_NODE);
        define_shader(layer, &shader, "ND_standard_surface_surfaceshader");
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
        // opacity is a color in this dialect
        let opacity = [data.opacity; 3];
        layer.write(s, "inputs:base", ValueType::Float, when, Value::Float(1.0));
        layer.write(s, "inputs:base_color", ValueType::Float3, when, Value::Float3(data.diffuse));
        layer.write(s, "inputs:opacity", ValueType::Float3, when, Value::Float3(opacity));
        layer.write(
            s,
            "inputs:emission",
            ValueType::Float,
            when,
            Value::Float(data.emissive_intensity),
        );
        layer.write(
            s,
            "inputs:emission_color",
            ValueType::Float3,
            when,
            Value::Float3(data.emissive),
        );
        layer.write(
            s,
            "inputs:specular_roughness",
            ValueType::Float,
            when,
            Value::Float(data.roughness),
        );
        layer.write(s, "inputs:metalness", ValueType::Float, when, Value::Float(data.metallic));
        layer.write(s, "inputs:specular_IOR", ValueType::Float, when, Value::Float(data.ior));
        connect(layer, s, "inputs:base_color", diffuse_source(nodes, data));
    }

    fn create_volume_shader(
        &self,
        layer: &mut Layer,
        material: &PrimPath,
        volume: &VolumeShading<'_>,
        when: WriteTime,
    ) -> PrimPath {
        let shader = material.child(VOLUME_NODE);
        define_shader(layer, &shader, "ND_volume_vdf");
        layer.set_relationship(material, VOLUME_TERMINAL, vec![shader.clone()]);
        write_transfer_function(layer, &shader, volume.transfer_function, when);
        for field in volume.fields {
            layer.set_default(
                &shader,
                &format!("inputs:{}_field", field),
                ValueType::Token,
                Value::Token(field.clone()),
            );
        }
        shader
    }

    fn surface_inputs(&self) -> &'static [(&'static str, ValueType)] {
        INPUTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::TransferFunction;

    #[test]
    fn test_volume_shader_fields() {
        let mut layer = Layer::new();
        let material = PrimPath::new("/Root/A/VolumeGeom_2/VolumeMaterial").unwrap();
        let tf = TransferFunction::default();
        let fields = vec!["density".to_string(), "diffuse".to_string()];
        let shader = StandardSurfaceBackend.create_volume_shader(
            &mut layer,
            &material,
            &VolumeShading {
                transfer_function: &tf,
                fields: &fields,
            },
            WriteTime::Default,
        );

        assert_eq!(shader.name(), VOLUME_NODE);
        assert!(layer.attribute(&shader, "inputs:density_field").is_some());
        let opacities = layer.attribute(&shader, "inputs:opacities").unwrap();
        assert_eq!(opacities.default, Some(Value::FloatArray(vec![0.0, 1.0])));
    }
}
