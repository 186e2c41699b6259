//! In-memory document layers and their edit operations.
//!
//! A [`Layer`] is a flat map from [`PrimPath`] to [`PrimSpec`]. Overlay layers
//! (live-edit deltas) record removals as tombstones and mark resets so that
//! composing them over their canonical layer reproduces the edits exactly.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::path::PrimPath;
use super::value::{Interpolation, Value, ValueType};
use crate::util::TimeCode;

fn is_false(v: &bool) -> bool {
    !*v
}

/// Time-ordered samples of one attribute.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSamples(Vec<(TimeCode, Value)>);

impl TimeSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the sample at `time`.
    pub fn insert(&mut self, time: TimeCode, value: Value) {
        match self.0.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(idx) => self.0[idx].1 = value,
            Err(idx) => self.0.insert(idx, (time, value)),
        }
    }

    /// Exact sample at `time`.
    pub fn get(&self, time: TimeCode) -> Option<&Value> {
        self.0
            .binary_search_by(|(t, _)| t.total_cmp(&time))
            .ok()
            .map(|idx| &self.0[idx].1)
    }

    /// Held value at `time`: the latest sample at or before `time`, or the
    /// first sample when `time` precedes all of them.
    pub fn held(&self, time: TimeCode) -> Option<&Value> {
        if self.0.is_empty() {
            return None;
        }
        let idx = match self.0.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) => idx - 1,
        };
        Some(&self.0[idx].1)
    }

    pub fn remove(&mut self, time: TimeCode) -> Option<Value> {
        self.0
            .binary_search_by(|(t, _)| t.total_cmp(&time))
            .ok()
            .map(|idx| self.0.remove(idx).1)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = TimeCode> + '_ {
        self.0.iter().map(|(t, _)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeCode, &Value)> + '_ {
        self.0.iter().map(|(t, v)| (*t, v))
    }

    /// Union with `stronger`; stronger samples win at equal times.
    pub fn merge_from(&mut self, stronger: &TimeSamples) {
        for (t, v) in stronger.iter() {
            self.insert(t, v.clone());
        }
    }
}

/// One attribute opinion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<Interpolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "TimeSamples::is_empty")]
    pub samples: TimeSamples,
    /// Overlay only: the weaker default was cleared.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_reset: bool,
    /// Overlay only: the weaker samples were cleared.
    #[serde(default, skip_serializing_if = "is_false")]
    pub samples_reset: bool,
}

impl AttributeSpec {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            interpolation: None,
            default: None,
            samples: TimeSamples::new(),
            default_reset: false,
            samples_reset: false,
        }
    }

    /// Value at `time`: held sample if any, else the default.
    pub fn value_at(&self, time: TimeCode) -> Option<&Value> {
        self.samples.held(time).or(self.default.as_ref())
    }

    fn check_type(&self, name: &str, value: &Value) {
        if let Some(vt) = value.value_type() {
            assert!(
                vt == self.value_type,
                "type mismatch writing attribute '{}': declared {}, got {}",
                name,
                self.value_type.name(),
                vt.name()
            );
        }
    }
}

/// Prim specifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specifier {
    #[default]
    Def,
    Over,
}

/// Reference to a prim in another document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub asset_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prim_path: Option<PrimPath>,
}

impl Reference {
    pub fn new(asset_path: impl Into<String>, prim_path: Option<PrimPath>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path,
        }
    }
}

/// Value clip metadata: which clip sub-document is active at which time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipSet {
    /// Clip sub-document asset paths, indexed by `active`.
    pub asset_paths: Vec<String>,
    /// Prim path inside each clip that holds the attribute values.
    pub prim_path: Option<PrimPath>,
    /// Document declaring which attributes come from clips.
    pub manifest_asset_path: String,
    /// `(stage time, asset index)` pairs.
    pub active: Vec<[f64; 2]>,
    /// `(stage time, clip time)` pairs.
    pub times: Vec<[f64; 2]>,
}

/// All opinions about one prim in one layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimSpec {
    pub specifier: Specifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Vec<PrimPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clips: Option<ClipSet>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Overlay only: attributes removed relative to weaker layers.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub removed_attributes: BTreeSet<String>,
}

impl PrimSpec {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.get(name)
    }

    /// True if this spec authors anything beyond an empty `over`.
    pub fn has_opinions(&self) -> bool {
        self.specifier == Specifier::Def
            || self.type_name.is_some()
            || !self.attributes.is_empty()
            || !self.relationships.is_empty()
            || self.references.is_some()
            || self.clips.is_some()
            || !self.metadata.is_empty()
            || !self.removed_attributes.is_empty()
    }
}

/// Scene up axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

/// Layer-wide metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_axis: Option<UpAxis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_codes_per_second: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prim: Option<String>,
    /// Sub-documents, strongest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sublayers: Vec<String>,
}

/// Where an authored value lands: the default or a time sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WriteTime {
    Default,
    At(TimeCode),
}

/// One document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub header: LayerHeader,
    #[serde(default)]
    pub prims: BTreeMap<PrimPath, PrimSpec>,
    /// Overlay only: subtrees removed relative to weaker layers.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub removed_prims: BTreeSet<PrimPath>,
    /// Overlay layers record tombstones and resets.
    #[serde(default, skip_serializing_if = "is_false")]
    pub overlay: bool,
}

impl Layer {
    /// Empty canonical layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty overlay (delta) layer.
    pub fn new_overlay() -> Self {
        Self {
            overlay: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty() && self.removed_prims.is_empty()
    }

    pub fn prim(&self, path: &PrimPath) -> Option<&PrimSpec> {
        self.prims.get(path)
    }

    pub fn prim_mut(&mut self, path: &PrimPath) -> Option<&mut PrimSpec> {
        self.prims.get_mut(path)
    }

    pub fn has_prim(&self, path: &PrimPath) -> bool {
        self.prims.contains_key(path)
    }

    pub fn attribute(&self, path: &PrimPath, name: &str) -> Option<&AttributeSpec> {
        self.prims.get(path).and_then(|p| p.attributes.get(name))
    }

    /// Direct children of `path` that have specs in this layer.
    pub fn children(&self, path: &PrimPath) -> Vec<PrimPath> {
        let depth = path.depth() + 1;
        self.prims
            .keys()
            .filter(|p| p.depth() == depth && p.has_prefix(path))
            .cloned()
            .collect()
    }

    /// True if any prim opinion or tombstone lies under `root`.
    pub fn has_content_under(&self, root: &PrimPath) -> bool {
        self.prims
            .iter()
            .any(|(p, spec)| p.has_prefix(root) && spec.has_opinions())
            || self.removed_prims.iter().any(|p| p.has_prefix(root))
    }

    /// Define a typed prim, creating typeless ancestors as needed.
    pub fn define_prim(&mut self, path: &PrimPath, type_name: Option<&str>) -> &mut PrimSpec {
        for ancestor in path.ancestors() {
            self.prims.entry(ancestor).or_default();
        }
        let spec = self.prims.entry(path.clone()).or_default();
        spec.specifier = Specifier::Def;
        if let Some(t) = type_name {
            spec.type_name = Some(t.to_string());
        }
        spec
    }

    /// Spec for `path`, created as an `over` if missing.
    pub fn prim_entry(&mut self, path: &PrimPath) -> &mut PrimSpec {
        self.prims.entry(path.clone()).or_insert_with(|| PrimSpec {
            specifier: Specifier::Over,
            ..PrimSpec::default()
        })
    }

    /// Remove the subtree at `path`. Overlays keep a tombstone.
    pub fn remove_prim(&mut self, path: &PrimPath) {
        self.prims.retain(|p, _| !p.has_prefix(path));
        if self.overlay {
            self.removed_prims.retain(|p| !p.has_prefix(path));
            self.removed_prims.insert(path.clone());
        }
    }

    /// Attribute spec, created if missing. Panics on a declared-type mismatch.
    pub fn attribute_entry(
        &mut self,
        path: &PrimPath,
        name: &str,
        value_type: ValueType,
    ) -> &mut AttributeSpec {
        let prim = self.prim_entry(path);
        let attr = prim
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| AttributeSpec::new(value_type));
        assert!(
            attr.value_type == value_type,
            "type mismatch on {}.{}: declared {}, requested {}",
            path,
            name,
            attr.value_type.name(),
            value_type.name()
        );
        attr
    }

    /// Author the time-independent value.
    pub fn set_default(&mut self, path: &PrimPath, name: &str, value_type: ValueType, value: Value) {
        let attr = self.attribute_entry(path, name, value_type);
        attr.check_type(name, &value);
        attr.default = Some(value);
    }

    /// Author a sample at `time`.
    pub fn set_sample(
        &mut self,
        path: &PrimPath,
        name: &str,
        value_type: ValueType,
        time: TimeCode,
        value: Value,
    ) {
        let attr = self.attribute_entry(path, name, value_type);
        attr.check_type(name, &value);
        attr.samples.insert(time, value);
    }

    /// Author either the default or a sample, depending on `when`.
    pub fn write(
        &mut self,
        path: &PrimPath,
        name: &str,
        value_type: ValueType,
        when: WriteTime,
        value: Value,
    ) {
        match when {
            WriteTime::Default => self.set_default(path, name, value_type, value),
            WriteTime::At(time) => self.set_sample(path, name, value_type, time, value),
        }
    }

    /// Remove one sample from this layer's opinion.
    pub fn remove_sample(&mut self, path: &PrimPath, name: &str, time: TimeCode) {
        if let Some(attr) = self.prims.get_mut(path).and_then(|p| p.attributes.get_mut(name)) {
            attr.samples.remove(time);
        }
    }

    /// Declare an attribute without giving it a value.
    pub fn declare_attribute(
        &mut self,
        path: &PrimPath,
        name: &str,
        value_type: ValueType,
        interpolation: Option<Interpolation>,
    ) {
        let attr = self.attribute_entry(path, name, value_type);
        if interpolation.is_some() {
            attr.interpolation = interpolation;
        }
    }

    pub fn set_interpolation(
        &mut self,
        path: &PrimPath,
        name: &str,
        value_type: ValueType,
        interpolation: Interpolation,
    ) {
        self.attribute_entry(path, name, value_type).interpolation = Some(interpolation);
    }

    /// Clear the default value, keeping samples.
    pub fn clear_default(&mut self, path: &PrimPath, name: &str, value_type: ValueType) {
        let overlay = self.overlay;
        let attr = self.attribute_entry(path, name, value_type);
        attr.default = None;
        if overlay {
            attr.default_reset = true;
        }
    }

    /// Clear every sample, keeping the default.
    pub fn clear_samples(&mut self, path: &PrimPath, name: &str, value_type: ValueType) {
        let overlay = self.overlay;
        let attr = self.attribute_entry(path, name, value_type);
        attr.samples.clear();
        if overlay {
            attr.samples_reset = true;
        }
    }

    /// Remove an attribute entirely. Overlays keep a tombstone.
    pub fn remove_attribute(&mut self, path: &PrimPath, name: &str) {
        if self.overlay {
            let prim = self.prim_entry(path);
            prim.attributes.remove(name);
            prim.removed_attributes.insert(name.to_string());
        } else if let Some(prim) = self.prims.get_mut(path) {
            prim.attributes.remove(name);
        }
    }

    pub fn set_relationship(&mut self, path: &PrimPath, name: &str, targets: Vec<PrimPath>) {
        self.prim_entry(path)
            .relationships
            .insert(name.to_string(), targets);
    }

    pub fn set_references(&mut self, path: &PrimPath, references: Vec<Reference>) {
        self.prim_entry(path).references = Some(references);
    }

    pub fn set_clips(&mut self, path: &PrimPath, clips: ClipSet) {
        self.prim_entry(path).clips = Some(clips);
    }

    pub fn set_metadata(&mut self, path: &PrimPath, key: &str, value: Value) {
        self.prim_entry(path).metadata.insert(key.to_string(), value);
    }

    /// Prim type name, if authored.
    pub fn type_name(&self, path: &PrimPath) -> Option<&str> {
        self.prims.get(path).and_then(|p| p.type_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_path() -> PrimPath {
        PrimPath::new("/Root/Actor/MeshGeom_7").unwrap()
    }

    #[test]
    fn test_define_creates_ancestors() {
        let mut layer = Layer::new();
        layer.define_prim(&mesh_path(), Some("Mesh"));
        assert!(layer.has_prim(&PrimPath::new("/Root").unwrap()));
        assert!(layer.has_prim(&PrimPath::new("/Root/Actor").unwrap()));
        assert_eq!(layer.type_name(&mesh_path()), Some("Mesh"));
        assert_eq!(layer.children(&PrimPath::new("/Root/Actor").unwrap()), vec![mesh_path()]);
    }

    #[test]
    fn test_samples_sorted_and_replaced() {
        let mut s = TimeSamples::new();
        s.insert(2.0, Value::Int(2));
        s.insert(0.0, Value::Int(0));
        s.insert(1.0, Value::Int(1));
        s.insert(1.0, Value::Int(10));
        assert_eq!(s.times().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        assert_eq!(s.get(1.0), Some(&Value::Int(10)));
        assert_eq!(s.held(1.5), Some(&Value::Int(10)));
        assert_eq!(s.held(-5.0), Some(&Value::Int(0)));
        assert_eq!(s.remove(0.0), Some(Value::Int(0)));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_remove_prim_subtree() {
        let mut layer = Layer::new();
        layer.define_prim(&mesh_path(), Some("Mesh"));
        layer.define_prim(&mesh_path().child("Protos"), None);
        layer.remove_prim(&mesh_path());
        assert!(!layer.has_prim(&mesh_path()));
        assert!(!layer.has_prim(&mesh_path().child("Protos")));
        assert!(layer.removed_prims.is_empty());
    }

    #[test]
    fn test_overlay_records_tombstones() {
        let mut delta = Layer::new_overlay();
        delta.remove_prim(&mesh_path());
        delta.remove_attribute(&mesh_path().parent().unwrap(), "primvars:st");
        assert!(delta.removed_prims.contains(&mesh_path()));
        let actor = delta.prim(&mesh_path().parent().unwrap()).unwrap();
        assert!(actor.removed_attributes.contains("primvars:st"));
        assert!(delta.has_content_under(&PrimPath::new("/Root").unwrap()));
    }

    #[test]
    fn test_clear_sets_reset_only_on_overlay() {
        let mut canonical = Layer::new();
        canonical.clear_samples(&mesh_path(), "points", ValueType::Float3Array);
        assert!(!canonical.attribute(&mesh_path(), "points").unwrap().samples_reset);

        let mut delta = Layer::new_overlay();
        delta.clear_samples(&mesh_path(), "points", ValueType::Float3Array);
        delta.clear_default(&mesh_path(), "points", ValueType::Float3Array);
        let attr = delta.attribute(&mesh_path(), "points").unwrap();
        assert!(attr.samples_reset && attr.default_reset);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn test_type_mismatch_is_fatal() {
        let mut layer = Layer::new();
        layer.set_default(&mesh_path(), "points", ValueType::Float3Array, Value::Float3Array(vec![]));
        layer.set_default(&mesh_path(), "points", ValueType::FloatArray, Value::FloatArray(vec![]));
    }

    #[test]
    fn test_blocked_is_accepted_for_any_type() {
        let mut layer = Layer::new();
        layer.set_sample(&mesh_path(), "normals", ValueType::Float3Array, 3.0, Value::Blocked);
        let attr = layer.attribute(&mesh_path(), "normals").unwrap();
        assert_eq!(attr.samples.get(3.0), Some(&Value::Blocked));
    }
}
