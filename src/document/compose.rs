//! Flattening a stronger layer over a weaker one.
//!
//! Used to merge a live-edit delta back into its canonical document. Samples
//! are unioned with the stronger opinion winning at equal times, unless the
//! stronger spec reset them.

use super::layer::{AttributeSpec, Layer, PrimSpec, Specifier};

/// Compose `strong` over `weak` into a new layer.
///
/// The result is an overlay only if `weak` is one; composing onto a
/// canonical layer drops all tombstones and reset flags.
pub fn compose(strong: &Layer, weak: &Layer) -> Layer {
    let mut out = weak.clone();
    let keep_markers = out.overlay;

    for removed in &strong.removed_prims {
        out.prims.retain(|p, _| !p.has_prefix(removed));
        if keep_markers {
            out.removed_prims.insert(removed.clone());
        }
    }

    for (path, spec) in &strong.prims {
        match out.prims.get_mut(path) {
            Some(existing) => merge_prim(existing, spec, keep_markers),
            None => {
                let mut copy = spec.clone();
                if !keep_markers {
                    strip_markers(&mut copy);
                }
                out.prims.insert(path.clone(), copy);
            }
        }
    }

    merge_header(&mut out, strong);
    out
}

fn merge_header(out: &mut Layer, strong: &Layer) {
    let h = &strong.header;
    if h.up_axis.is_some() {
        out.header.up_axis = h.up_axis;
    }
    if h.start_time.is_some() {
        out.header.start_time = h.start_time;
    }
    if h.end_time.is_some() {
        out.header.end_time = h.end_time;
    }
    if h.time_codes_per_second.is_some() {
        out.header.time_codes_per_second = h.time_codes_per_second;
    }
    if h.default_prim.is_some() {
        out.header.default_prim = h.default_prim.clone();
    }
    if !h.sublayers.is_empty() {
        out.header.sublayers = h.sublayers.clone();
    }
}

fn strip_markers(spec: &mut PrimSpec) {
    spec.removed_attributes.clear();
    for attr in spec.attributes.values_mut() {
        attr.default_reset = false;
        attr.samples_reset = false;
    }
}

fn merge_prim(weak: &mut PrimSpec, strong: &PrimSpec, keep_markers: bool) {
    if strong.specifier == Specifier::Def {
        weak.specifier = Specifier::Def;
    }
    if strong.type_name.is_some() {
        weak.type_name = strong.type_name.clone();
    }

    for name in &strong.removed_attributes {
        weak.attributes.remove(name);
        if keep_markers {
            weak.removed_attributes.insert(name.clone());
        }
    }

    for (name, attr) in &strong.attributes {
        match weak.attributes.get_mut(name) {
            Some(existing) => merge_attribute(existing, attr, keep_markers),
            None => {
                let mut copy = attr.clone();
                if !keep_markers {
                    copy.default_reset = false;
                    copy.samples_reset = false;
                }
                weak.attributes.insert(name.clone(), copy);
            }
        }
    }

    for (name, targets) in &strong.relationships {
        weak.relationships.insert(name.clone(), targets.clone());
    }
    if strong.references.is_some() {
        weak.references = strong.references.clone();
    }
    if strong.clips.is_some() {
        weak.clips = strong.clips.clone();
    }
    for (key, value) in &strong.metadata {
        weak.metadata.insert(key.clone(), value.clone());
    }
}

fn merge_attribute(weak: &mut AttributeSpec, strong: &AttributeSpec, keep_markers: bool) {
    weak.value_type = strong.value_type;
    if strong.interpolation.is_some() {
        weak.interpolation = strong.interpolation;
    }

    if strong.default.is_some() {
        weak.default = strong.default.clone();
    } else if strong.default_reset {
        weak.default = None;
    }

    if strong.samples_reset {
        weak.samples = strong.samples.clone();
    } else {
        weak.samples.merge_from(&strong.samples);
    }

    if keep_markers {
        weak.default_reset |= strong.default_reset;
        weak.samples_reset |= strong.samples_reset;
    } else {
        weak.default_reset = false;
        weak.samples_reset = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PrimPath, Value, ValueType};

    fn p(s: &str) -> PrimPath {
        PrimPath::new(s).unwrap()
    }

    fn canonical() -> Layer {
        let mut layer = Layer::new();
        let mesh = p("/Root/A/MeshGeom_1");
        layer.define_prim(&mesh, Some("Mesh"));
        layer.set_default(&mesh, "doubleSided", ValueType::Bool, Value::Bool(true));
        layer.set_sample(&mesh, "visibility", ValueType::Token, 0.0, Value::Token("inherited".into()));
        layer.set_sample(&mesh, "visibility", ValueType::Token, 1.0, Value::Token("inherited".into()));
        layer
    }

    #[test]
    fn test_samples_union_strong_wins() {
        let weak = canonical();
        let mut delta = Layer::new_overlay();
        let mesh = p("/Root/A/MeshGeom_1");
        delta.set_sample(&mesh, "visibility", ValueType::Token, 1.0, Value::Token("invisible".into()));
        delta.set_sample(&mesh, "visibility", ValueType::Token, 2.0, Value::Token("inherited".into()));

        let out = compose(&delta, &weak);
        let vis = out.attribute(&mesh, "visibility").unwrap();
        assert_eq!(vis.samples.len(), 3);
        assert_eq!(vis.samples.get(1.0), Some(&Value::Token("invisible".into())));
        assert_eq!(out.prim(&mesh).unwrap().specifier, Specifier::Def);
        assert!(!out.overlay);
    }

    #[test]
    fn test_reset_replaces_weaker_samples() {
        let weak = canonical();
        let mut delta = Layer::new_overlay();
        let mesh = p("/Root/A/MeshGeom_1");
        delta.clear_samples(&mesh, "visibility", ValueType::Token);
        delta.set_sample(&mesh, "visibility", ValueType::Token, 5.0, Value::Token("inherited".into()));

        let out = compose(&delta, &weak);
        let vis = out.attribute(&mesh, "visibility").unwrap();
        assert_eq!(vis.samples.times().collect::<Vec<_>>(), vec![5.0]);
        assert!(!vis.samples_reset);
    }

    #[test]
    fn test_tombstones_remove_weaker_content() {
        let weak = canonical();
        let mut delta = Layer::new_overlay();
        delta.remove_attribute(&p("/Root/A/MeshGeom_1"), "doubleSided");
        let out = compose(&delta, &weak);
        assert!(out.attribute(&p("/Root/A/MeshGeom_1"), "doubleSided").is_none());
        assert!(out.prim(&p("/Root/A/MeshGeom_1")).unwrap().removed_attributes.is_empty());

        let mut delta = Layer::new_overlay();
        delta.remove_prim(&p("/Root/A"));
        let out = compose(&delta, &weak);
        assert!(!out.has_prim(&p("/Root/A/MeshGeom_1")));
        assert!(out.removed_prims.is_empty());
    }

    #[test]
    fn test_empty_delta_is_identity() {
        let weak = canonical();
        assert_eq!(compose(&Layer::new_overlay(), &weak), weak);
    }
}
