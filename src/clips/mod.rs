//! Time-varying clip bookkeeping.
//!
//! Each time-varying geometry writes one clip sub-document per time step.
//! The [`ClipLedger`] records which clip asset backs which time and is
//! serialized into the geometry's [`ClipSet`] metadata. Asset indices stay
//! stable while an asset is referenced; removed time entries are swapped
//! out, so entry order carries no meaning.

mod retime;

pub use retime::ActorTimeline;

use crate::document::{ClipSet, PrimPath};
use crate::util::TimeCode;

/// One clip asset the ledger indexes into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipAsset {
    /// Scene-directory relative path of the clip document.
    pub path: String,
    /// The path is a live-edit counterpart of the canonical clip.
    pub live: bool,
    /// Referenced by at least one time entry.
    pub alive: bool,
}

/// Result of removing one time entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedClip {
    pub asset_index: usize,
    pub path: String,
    /// Another time entry still uses the asset, so the file must stay.
    pub still_referenced: bool,
}

/// `(time, asset index)` entries plus the asset array they index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClipLedger {
    entries: Vec<(TimeCode, usize)>,
    assets: Vec<ClipAsset>,
}

impl ClipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in ledger order.
    pub fn entries(&self) -> &[(TimeCode, usize)] {
        &self.entries
    }

    pub fn assets(&self) -> &[ClipAsset] {
        &self.assets
    }

    pub fn asset(&self, index: usize) -> Option<&ClipAsset> {
        self.assets.get(index)
    }

    /// Asset index recorded for exactly `time`.
    pub fn find(&self, time: TimeCode) -> Option<usize> {
        self.entries
            .iter()
            .find(|(t, _)| *t == time)
            .map(|(_, idx)| *idx)
    }

    /// Asset index for `time`, falling back to the first asset when the
    /// ledger has no entry for it.
    pub fn asset_index_at(&self, time: TimeCode) -> usize {
        self.find(time).unwrap_or(0)
    }

    /// Times in ascending order.
    pub fn times(&self) -> Vec<TimeCode> {
        let mut times: Vec<_> = self.entries.iter().map(|(t, _)| *t).collect();
        times.sort_by(f64::total_cmp);
        times
    }

    /// Record a clip for `time` backed by `path`.
    ///
    /// Returns `(is_new, asset_index)`; an existing entry for `time` is left
    /// untouched. Paths already in the asset array keep their index.
    pub fn insert(&mut self, time: TimeCode, path: &str) -> (bool, usize) {
        if let Some(idx) = self.find(time) {
            return (false, idx);
        }
        let idx = match self.assets.iter().position(|a| a.path == path) {
            Some(idx) => {
                self.assets[idx].alive = true;
                idx
            }
            None => {
                self.assets.push(ClipAsset {
                    path: path.to_string(),
                    live: false,
                    alive: true,
                });
                self.assets.len() - 1
            }
        };
        self.entries.push((time, idx));
        (true, idx)
    }

    /// Drop the entry for `time` by swapping it with the last entry.
    pub fn remove_time(&mut self, time: TimeCode) -> Option<RemovedClip> {
        let pos = self.entries.iter().position(|(t, _)| *t == time)?;
        let (_, asset_index) = self.entries.swap_remove(pos);
        let still_referenced = self.entries.iter().any(|(_, idx)| *idx == asset_index);
        let asset = &mut self.assets[asset_index];
        if !still_referenced {
            asset.alive = false;
        }
        Some(RemovedClip {
            asset_index,
            path: asset.path.clone(),
            still_referenced,
        })
    }

    /// Point an asset at a different path, e.g. its live counterpart.
    pub fn set_asset_path(&mut self, index: usize, path: String, live: bool) {
        let asset = &mut self.assets[index];
        asset.path = path;
        asset.live = live;
    }

    /// Paths of every asset still referenced by an entry.
    pub fn alive_paths(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().filter(|a| a.alive).map(|a| a.path.as_str())
    }

    /// Clip metadata with identity retiming: each entry is active at its own
    /// time and plays its own time.
    pub fn to_clip_set(&self, prim_path: &PrimPath, manifest: &str) -> ClipSet {
        let mut active: Vec<[f64; 2]> = self
            .entries
            .iter()
            .map(|(t, idx)| [*t, *idx as f64])
            .collect();
        active.sort_by(|a, b| a[0].total_cmp(&b[0]));
        let times = active.iter().map(|a| [a[0], a[0]]).collect();
        ClipSet {
            asset_paths: self.assets.iter().map(|a| a.path.clone()).collect(),
            prim_path: Some(prim_path.clone()),
            manifest_asset_path: manifest.to_string(),
            active,
            times,
        }
    }

    /// Rebuild from persisted clip metadata.
    ///
    /// Stage times become ledger times; assets no `active` entry names are
    /// kept but marked dead so their indices survive.
    pub fn from_clip_set(clips: &ClipSet, is_live_path: impl Fn(&str) -> bool) -> Self {
        let mut ledger = Self {
            entries: Vec::with_capacity(clips.active.len()),
            assets: clips
                .asset_paths
                .iter()
                .map(|p| ClipAsset {
                    path: p.clone(),
                    live: is_live_path(p),
                    alive: false,
                })
                .collect(),
        };
        for [time, idx] in &clips.active {
            let idx = *idx as usize;
            if idx < ledger.assets.len() && ledger.find(*time).is_none() {
                ledger.assets[idx].alive = true;
                ledger.entries.push((*time, idx));
            }
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(t: u32) -> String {
        format!("geometries/A_MeshGeom_7_{}.sdoc", t)
    }

    #[test]
    fn test_insert_is_idempotent_per_time() {
        let mut ledger = ClipLedger::new();
        assert_eq!(ledger.insert(0.0, &clip(0)), (true, 0));
        assert_eq!(ledger.insert(1.0, &clip(1)), (true, 1));
        assert_eq!(ledger.insert(0.0, &clip(0)), (false, 0));
        assert_eq!(ledger.entries(), &[(0.0, 0), (1.0, 1)]);
    }

    #[test]
    fn test_remove_swaps_with_last() {
        let mut ledger = ClipLedger::new();
        for t in 0..3 {
            ledger.insert(t as f64, &clip(t));
        }
        let removed = ledger.remove_time(0.0).unwrap();
        assert_eq!(removed.asset_index, 0);
        assert!(!removed.still_referenced);
        assert_eq!(ledger.entries(), &[(2.0, 2), (1.0, 1)]);
        assert!(!ledger.asset(0).unwrap().alive);
        assert!(ledger.remove_time(0.0).is_none());
    }

    #[test]
    fn test_shared_asset_stays_referenced() {
        let mut ledger = ClipLedger::new();
        ledger.insert(0.0, "geometries/shared.sdoc");
        ledger.insert(1.0, "geometries/shared.sdoc");
        assert_eq!(ledger.assets().len(), 1);

        let first = ledger.remove_time(1.0).unwrap();
        assert!(first.still_referenced);
        let last = ledger.remove_time(0.0).unwrap();
        assert!(!last.still_referenced);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_reinsert_revives_asset() {
        let mut ledger = ClipLedger::new();
        ledger.insert(0.0, &clip(0));
        ledger.remove_time(0.0);
        assert_eq!(ledger.insert(0.0, &clip(0)), (true, 0));
        assert!(ledger.asset(0).unwrap().alive);
    }

    #[test]
    fn test_clip_set_rebuild() {
        let prim = PrimPath::new("/Root/A/MeshGeom_7").unwrap();
        let mut ledger = ClipLedger::new();
        ledger.insert(2.0, &clip(2));
        ledger.insert(1.0, &clip(1));
        ledger.insert(3.0, &clip(3));
        ledger.remove_time(3.0);

        let set = ledger.to_clip_set(&prim, "topologies/A_MeshGeom_7.sdoc");
        assert_eq!(set.active, vec![[1.0, 1.0], [2.0, 0.0]]);
        assert_eq!(set.times, vec![[1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(set.asset_paths.len(), 3);

        let rebuilt = ClipLedger::from_clip_set(&set, |p| p.ends_with(".live.sdoc"));
        assert_eq!(rebuilt.find(1.0), Some(1));
        assert_eq!(rebuilt.find(2.0), Some(0));
        assert!(!rebuilt.asset(2).unwrap().alive);
        assert_eq!(rebuilt.alive_paths().count(), 2);
    }
}
