//! Actor timeline retiming.
//!
//! An actor may play its local animation at different scene times. The
//! actor's timeline records `(scene time, actor time)` pairs; pushing it down
//! to a geometry maps each pair onto the geometry's own clip ledger.

use super::ClipLedger;
use crate::document::{ClipSet, PrimPath};
use crate::util::TimeCode;

/// Scene-level clip ledger of one actor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorTimeline {
    entries: Vec<(TimeCode, TimeCode)>,
}

impl ActorTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the actor plays in scene time (no retiming).
    pub fn is_identity(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(TimeCode, TimeCode)] {
        &self.entries
    }

    /// Show actor time `actor_time` at scene time `scene_time`.
    pub fn set(&mut self, scene_time: TimeCode, actor_time: TimeCode) {
        match self.entries.iter_mut().find(|(s, _)| *s == scene_time) {
            Some(entry) => entry.1 = actor_time,
            None => self.entries.push((scene_time, actor_time)),
        }
    }

    pub fn remove(&mut self, scene_time: TimeCode) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(s, _)| *s != scene_time);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clip metadata for a geometry ledger as seen through this timeline.
    ///
    /// Every scene time activates the asset the geometry recorded for the
    /// mapped actor time. When the geometry has no clip at exactly that
    /// actor time the first asset is used; visibility hides the geometry in
    /// that case.
    pub fn retime(&self, ledger: &ClipLedger, prim_path: &PrimPath, manifest: &str) -> ClipSet {
        if self.is_identity() {
            return ledger.to_clip_set(prim_path, manifest);
        }
        let mut pairs = self.entries.clone();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut set = ledger.to_clip_set(prim_path, manifest);
        set.active = pairs
            .iter()
            .map(|(scene, actor)| [*scene, ledger.asset_index_at(*actor) as f64])
            .collect();
        set.times = pairs.iter().map(|(scene, actor)| [*scene, *actor]).collect();
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prim() -> PrimPath {
        PrimPath::new("/Root/A/CurveGeom_1").unwrap()
    }

    #[test]
    fn test_identity_passes_ledger_through() {
        let mut ledger = ClipLedger::new();
        ledger.insert(5.0, "geometries/c5.sdoc");
        let set = ActorTimeline::new().retime(&ledger, &prim(), "topologies/c.sdoc");
        assert_eq!(set.active, vec![[5.0, 0.0]]);
        assert_eq!(set.times, vec![[5.0, 5.0]]);
    }

    #[test]
    fn test_retime_maps_actor_time() {
        let mut ledger = ClipLedger::new();
        ledger.insert(0.0, "geometries/c0.sdoc");
        ledger.insert(1.0, "geometries/c1.sdoc");

        let mut timeline = ActorTimeline::new();
        timeline.set(10.0, 1.0);
        timeline.set(11.0, 0.0);
        timeline.set(10.0, 1.0);
        let set = timeline.retime(&ledger, &prim(), "topologies/c.sdoc");
        assert_eq!(set.active, vec![[10.0, 1.0], [11.0, 0.0]]);
        assert_eq!(set.times, vec![[10.0, 1.0], [11.0, 0.0]]);
    }

    #[test]
    fn test_missing_actor_time_falls_back_to_first_asset() {
        let mut ledger = ClipLedger::new();
        ledger.insert(0.0, "geometries/c0.sdoc");
        ledger.insert(1.0, "geometries/c1.sdoc");

        let mut timeline = ActorTimeline::new();
        timeline.set(3.0, 0.5);
        let set = timeline.retime(&ledger, &prim(), "topologies/c.sdoc");
        assert_eq!(set.active, vec![[3.0, 0.0]]);
        assert!(timeline.remove(3.0));
        assert!(timeline.is_identity());
    }
}
