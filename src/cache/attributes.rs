//! Per-attribute change tracking.
//!
//! Every attribute a geometry writes keeps a small state record so each
//! update can decide independently whether the attribute changed shape,
//! whether its time-varying policy flipped and whether a static value needs
//! rewriting at all.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::document::{Interpolation, ValueType};
use crate::util::ContentKey;

bitflags! {
    /// Semantic geometry attributes, used as the time-varying policy mask
    /// of an update.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct GeomAttrs: u32 {
        const POINTS = 1 << 0;
        const NORMALS = 1 << 1;
        const TEX_COORDS = 1 << 2;
        const COLORS = 1 << 3;
        const INDICES = 1 << 4;
        const SCALES = 1 << 5;
        const ORIENTATIONS = 1 << 6;
        const PROTO_INDICES = 1 << 7;
        const INVISIBLE_IDS = 1 << 8;
        const INSTANCE_IDS = 1 << 9;
        const VELOCITIES = 1 << 10;
        const WIDTHS = 1 << 11;
        const CURVE_COUNTS = 1 << 12;
        const VOLUME_DATA = 1 << 13;
    }
}

/// Shape and identity of a value about to be written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Incoming {
    pub value_type: ValueType,
    pub len: usize,
    pub interpolation: Option<Interpolation>,
    pub content: ContentKey,
}

/// What the writer has to do for one attribute in one update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeDecision {
    /// Never written before.
    pub first_write: bool,
    pub time_varying: bool,
    /// Time-varying status differs from the previous write; earlier values
    /// must be cleared.
    pub flipped: bool,
    /// Element count or interpolation changed.
    pub structure_changed: bool,
    /// Declared value type changed; the attribute must be recreated.
    pub type_changed: bool,
    /// Static content differs from what was last written.
    pub content_changed: bool,
}

impl AttributeDecision {
    /// The static value has to be (re)written.
    pub fn needs_static_write(&self) -> bool {
        !self.time_varying
            && (self.first_write || self.flipped || self.structure_changed || self.content_changed)
    }

    /// The manifest declaration has to be (re)written.
    pub fn needs_declaration(&self) -> bool {
        self.time_varying
            && (self.first_write || self.flipped || self.structure_changed || self.type_changed)
    }
}

/// Last written state of one attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeState {
    pub time_varying: bool,
    pub value_type: Option<ValueType>,
    pub interpolation: Option<Interpolation>,
    pub len: usize,
    /// Content of the last static write.
    pub content: Option<ContentKey>,
    /// Last static write was the "no value" sentinel.
    pub blocked: bool,
}

/// Attribute states of one geometry, keyed by attribute name.
#[derive(Clone, Debug, Default)]
pub struct AttributeTracker {
    states: HashMap<String, AttributeState>,
}

impl AttributeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> Option<&AttributeState> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Forget an attribute, e.g. after deleting a generic array.
    pub fn forget(&mut self, name: &str) -> Option<AttributeState> {
        self.states.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Decide how to write `name` and record the new state.
    ///
    /// `incoming` is `None` when the update carries no value for the
    /// attribute; the writer then authors the "no value" sentinel.
    pub fn evaluate(
        &mut self,
        name: &str,
        time_varying: bool,
        incoming: Option<&Incoming>,
    ) -> AttributeDecision {
        let first_write = !self.states.contains_key(name);
        let state = self.states.entry(name.to_string()).or_default();

        let flipped = !first_write && state.time_varying != time_varying;
        let mut decision = AttributeDecision {
            first_write,
            time_varying,
            flipped,
            ..AttributeDecision::default()
        };

        match incoming {
            Some(inc) => {
                decision.type_changed = !first_write
                    && state.value_type.is_some()
                    && state.value_type != Some(inc.value_type);
                decision.structure_changed = !first_write
                    && (state.len != inc.len || state.interpolation != inc.interpolation);
                decision.content_changed = state.blocked || state.content != Some(inc.content);

                state.value_type = Some(inc.value_type);
                state.interpolation = inc.interpolation;
                state.len = inc.len;
                state.blocked = false;
                state.content = if time_varying { None } else { Some(inc.content) };
            }
            None => {
                decision.content_changed = !state.blocked;
                state.blocked = true;
                state.content = None;
                state.len = 0;
            }
        }
        state.time_varying = time_varying;
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(data: &[[f32; 3]]) -> Incoming {
        Incoming {
            value_type: ValueType::Float3Array,
            len: data.len(),
            interpolation: None,
            content: ContentKey::from_pod(data),
        }
    }

    #[test]
    fn test_unchanged_static_value_is_skipped() {
        let mut tracker = AttributeTracker::new();
        let a = points(&[[0.0; 3], [1.0; 3]]);
        assert!(tracker.evaluate("points", false, Some(&a)).needs_static_write());
        assert!(!tracker.evaluate("points", false, Some(&a)).needs_static_write());

        let b = points(&[[0.0; 3], [2.0; 3]]);
        let d = tracker.evaluate("points", false, Some(&b));
        assert!(d.content_changed && !d.structure_changed);
    }

    #[test]
    fn test_policy_flip() {
        let mut tracker = AttributeTracker::new();
        let a = points(&[[0.0; 3]]);
        tracker.evaluate("points", false, Some(&a));
        let d = tracker.evaluate("points", true, Some(&a));
        assert!(d.flipped && d.time_varying && d.needs_declaration());

        let d = tracker.evaluate("points", true, Some(&a));
        assert!(!d.flipped && !d.needs_declaration());

        // back to static rewrites even though content is unchanged
        let d = tracker.evaluate("points", false, Some(&a));
        assert!(d.flipped && d.needs_static_write());
    }

    #[test]
    fn test_structure_and_type_changes() {
        let mut tracker = AttributeTracker::new();
        tracker.evaluate("points", false, Some(&points(&[[0.0; 3]])));
        let d = tracker.evaluate("points", false, Some(&points(&[[0.0; 3], [0.0; 3]])));
        assert!(d.structure_changed);

        let ints = Incoming {
            value_type: ValueType::IntArray,
            len: 2,
            interpolation: None,
            content: ContentKey::from_pod(&[1i32, 2]),
        };
        assert!(tracker.evaluate("points", false, Some(&ints)).type_changed);
    }

    #[test]
    fn test_absent_value_blocks_once() {
        let mut tracker = AttributeTracker::new();
        tracker.evaluate("normals", false, Some(&points(&[[0.0; 3]])));
        assert!(tracker.evaluate("normals", false, None).needs_static_write());
        assert!(!tracker.evaluate("normals", false, None).needs_static_write());
        assert!(tracker.state("normals").unwrap().blocked);
        assert!(tracker.forget("normals").is_some());
        assert!(!tracker.contains("normals"));
    }
}
