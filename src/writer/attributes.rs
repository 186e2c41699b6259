//! Attribute writes of one geometry update.
//!
//! Each [`AttrWrite`] runs through the geometry's [`AttributeTracker`]:
//! static values land as defaults in the actor document (skipped when their
//! content is unchanged), time-varying values are declared in the manifest
//! and sampled into the clip of the current time step.

use bytemuck::Pod;
use glam::Vec3;

use super::Ctx;
use crate::cache::{GeomRecord, Incoming};
use crate::document::{Interpolation, Layer, PrimPath, Value, ValueType};
use crate::util::{ContentKey, TimeCode};

/// One attribute value headed for a geometry.
#[derive(Clone, Debug)]
pub(crate) struct AttrWrite {
    /// Tracker key; the attribute name unless the prim is a child.
    pub key: String,
    pub prim: PrimPath,
    pub name: String,
    pub value_type: ValueType,
    pub interpolation: Option<Interpolation>,
    /// `None` authors the "no value" sentinel.
    pub value: Option<Value>,
    pub content: ContentKey,
    pub time_varying: bool,
}

impl AttrWrite {
    pub fn new(prim: &PrimPath, name: &str, value_type: ValueType, value: Option<Value>) -> Self {
        Self {
            key: name.to_string(),
            prim: prim.clone(),
            name: name.to_string(),
            value_type,
            interpolation: None,
            value,
            content: ContentKey::from_bytes(&[]),
            time_varying: false,
        }
    }

    /// Attribute from a plain-old-data slice.
    pub fn pod<T: Pod>(
        prim: &PrimPath,
        name: &str,
        value_type: ValueType,
        data: Option<&[T]>,
        wrap: fn(Vec<T>) -> Value,
    ) -> Self {
        let mut write = Self::new(prim, name, value_type, data.map(|d| wrap(d.to_vec())));
        if let Some(d) = data {
            write.content = ContentKey::from_pod(d);
        }
        write
    }

    pub fn content(mut self, content: ContentKey) -> Self {
        self.content = content;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = Some(interpolation);
        self.content = self.content.chain(interpolation.name().as_bytes());
        self
    }

    pub fn time_varying(mut self, time_varying: bool) -> Self {
        self.time_varying = time_varying;
        self
    }

    /// Track under a key qualified by the child prim name.
    pub fn keyed(mut self, key: String) -> Self {
        self.key = key;
        self
    }
}

/// Tracker key of a generic array.
pub(crate) fn primvar_name(name: &str) -> String {
    format!("primvars:{}", name)
}

/// `[min, max]` bounds of a point set; empty sets give a zero box.
pub(crate) fn compute_extent(points: &[[f32; 3]]) -> [[f32; 3]; 2] {
    if points.is_empty() {
        return [[0.0; 3]; 2];
    }
    let (min, max) = points.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(lo, hi), p| {
            let p = Vec3::from_array(*p);
            (lo.min(p), hi.max(p))
        },
    );
    [min.to_array(), max.to_array()]
}

/// Extent attribute following the time-varying policy of the points.
pub(crate) fn extent_write(prim: &PrimPath, points: &[[f32; 3]], time_varying: bool) -> AttrWrite {
    let extent = compute_extent(points);
    AttrWrite::pod(prim, "extent", ValueType::Float3Array, Some(&extent[..]), Value::Float3Array)
        .time_varying(time_varying)
}

impl Ctx<'_> {
    /// Remove `name` on `prim` from every live clip of the geometry.
    pub(crate) fn purge_from_clips(&mut self, record: &mut GeomRecord, prim: &PrimPath, name: &str) {
        let indices: Vec<usize> = record
            .ledger
            .assets()
            .iter()
            .enumerate()
            .filter(|(_, a)| a.alive)
            .map(|(i, _)| i)
            .collect();
        for index in indices {
            if self.live {
                crate::live::migrate_clip_to_live(self.conn, self.layout, &mut record.ledger, index);
            }
            let Some(asset) = record.ledger.asset(index) else {
                continue;
            };
            let path = self.layout.store_path(&asset.path);
            let Some(mut clip) = self.docs.load(self.conn, &path) else {
                continue;
            };
            if clip.attribute(prim, name).is_some() {
                clip.remove_attribute(prim, name);
                self.docs.write_layer(self.conn, &path, &clip);
            }
        }
    }

    /// Apply every write of one update.
    ///
    /// `clip` is the clip layer of time `time`; the caller persists it.
    pub(crate) fn apply_writes(
        &mut self,
        actor_doc: &str,
        record: &mut GeomRecord,
        clip: &mut Layer,
        time: TimeCode,
        writes: Vec<AttrWrite>,
    ) {
        let manifest = self.layout.store_path(&record.manifest);
        for w in writes {
            let incoming = w.value.as_ref().map(|v| Incoming {
                value_type: w.value_type,
                len: v.len(),
                interpolation: w.interpolation,
                content: w.content,
            });
            if incoming.is_none() && !record.attributes.contains(&w.key) {
                continue;
            }
            let decision = record
                .attributes
                .evaluate(&w.key, w.time_varying, incoming.as_ref());
            let value_type = record
                .attributes
                .state(&w.key)
                .and_then(|s| s.value_type)
                .unwrap_or(w.value_type);

            if decision.type_changed {
                self.edit(actor_doc).remove_attribute(&w.prim, &w.name);
                self.edit(&manifest).remove_attribute(&w.prim, &w.name);
                clip.remove_attribute(&w.prim, &w.name);
                self.purge_from_clips(record, &w.prim, &w.name);
            }

            let value = w.value.unwrap_or(Value::Blocked);
            if w.time_varying {
                if decision.flipped {
                    self.edit(actor_doc).remove_attribute(&w.prim, &w.name);
                }
                if decision.needs_declaration() || decision.type_changed {
                    self.edit(&manifest)
                        .declare_attribute(&w.prim, &w.name, value_type, w.interpolation);
                }
                clip.set_sample(&w.prim, &w.name, value_type, time, value);
                if let Some(interp) = w.interpolation {
                    clip.set_interpolation(&w.prim, &w.name, value_type, interp);
                }
            } else {
                if decision.flipped {
                    self.edit(&manifest).remove_attribute(&w.prim, &w.name);
                    clip.remove_attribute(&w.prim, &w.name);
                    self.purge_from_clips(record, &w.prim, &w.name);
                }
                if decision.needs_static_write() || decision.type_changed {
                    let layer = self.edit(actor_doc);
                    layer.set_default(&w.prim, &w.name, value_type, value);
                    if let Some(interp) = w.interpolation {
                        layer.set_interpolation(&w.prim, &w.name, value_type, interp);
                    }
                }
            }
        }
    }

    /// Drop generic arrays the caller deleted.
    pub(crate) fn delete_generic_arrays(
        &mut self,
        actor_doc: &str,
        record: &mut GeomRecord,
        clip: &mut Layer,
        names: &[&str],
    ) {
        let manifest = self.layout.store_path(&record.manifest);
        let prim = record.path.clone();
        for name in names {
            let attr = primvar_name(name);
            if record.attributes.forget(&attr).is_none() {
                continue;
            }
            self.edit(actor_doc).remove_attribute(&prim, &attr);
            self.edit(&manifest).remove_attribute(&prim, &attr);
            clip.remove_attribute(&prim, &attr);
            self.purge_from_clips(record, &prim, &attr);
        }
    }
}
