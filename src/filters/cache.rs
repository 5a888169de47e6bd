// src/filters/cache.rs
use std::collections::HashMap;

use super::hierarchy::FilterHierarchy;
use super::selection::SelectionSignature;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub values: Vec<String>,
    pub epoch: u64,
}

/// Selectable values per `(filter code, ancestor signature)`.
///
/// Invalidation is lazy: each filter carries an epoch floor, and entries
/// stamped below it are dropped when next looked at. The same floor rejects
/// results of resolutions issued before the invalidation.
#[derive(Debug, Default)]
pub struct SelectableValuesCache {
    entries: HashMap<(String, SelectionSignature), CacheEntry>,
    floors: HashMap<String, u64>,
}

impl SelectableValuesCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn floor(&self, code: &str) -> u64 {
        self.floors.get(code).copied().unwrap_or(0)
    }

    pub fn get(&mut self, code: &str, signature: &SelectionSignature) -> Option<&[String]> {
        let key = (code.to_string(), signature.clone());
        let stale = match self.entries.get(&key) {
            Some(entry) => entry.epoch < self.floor(code),
            None => return None,
        };
        if stale {
            bevy::log::trace!("Dropping stale cache entry for '{}' under {}", code, signature);
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|entry| entry.values.as_slice())
    }

    /// Store `values` unless a newer result or invalidation already exists.
    /// Returns whether the values were stored.
    pub fn put(
        &mut self,
        code: &str,
        signature: &SelectionSignature,
        values: Vec<String>,
        epoch: u64,
    ) -> bool {
        if epoch < self.floor(code) {
            return false;
        }
        let key = (code.to_string(), signature.clone());
        if let Some(existing) = self.entries.get(&key) {
            if epoch < existing.epoch {
                return false;
            }
        }
        self.entries.insert(key, CacheEntry { values, epoch });
        true
    }

    /// Whether work stamped with `epoch` for `code` has been overtaken by an
    /// invalidation.
    pub fn is_superseded(&self, code: &str, epoch: u64) -> bool {
        epoch < self.floor(code)
    }

    /// Make every entry of `code` older than `epoch` unusable.
    pub fn invalidate(&mut self, code: &str, epoch: u64) {
        let floor = self.floors.entry(code.to_string()).or_insert(0);
        if epoch > *floor {
            *floor = epoch;
        }
    }

    /// Drop every entry of `code` now, leaving its floor alone.
    pub fn evict(&mut self, code: &str) {
        self.entries.retain(|(entry_code, _), _| entry_code != code);
    }

    /// Remove the entries of `code` and invalidate all of its descendants as
    /// of `epoch`. Must run before any recomputation for the new selection is
    /// issued.
    ///
    /// Only the descendants get a raised floor: a filter's own values never
    /// depend on its own selection, so its in-flight resolutions stay valid.
    pub fn invalidate_descendants(&mut self, hierarchy: &FilterHierarchy, code: &str, epoch: u64) {
        self.evict(code);
        let descendants = hierarchy.descendants(code);
        for descendant in &descendants {
            self.invalidate(descendant, epoch);
        }
        bevy::log::trace!(
            "Invalidated cache for '{}' and {} descendants at epoch {}",
            code,
            descendants.len(),
            epoch
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.floors.clear();
    }

    /// Number of stored entries, including ones not yet lazily dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::definitions::{FilterDefinition, FilterEdge, FilterKind, HierarchyDescription};
    use crate::filters::selection::FilterSelectionState;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn chain() -> FilterHierarchy {
        let filters = ["A", "B", "C", "Other"]
            .iter()
            .map(|c| FilterDefinition::new(*c, FilterKind::Text, "T", *c))
            .collect();
        FilterHierarchy::build(&HierarchyDescription::new(
            filters,
            vec![FilterEdge::new("A", "B"), FilterEdge::new("B", "C")],
        ))
        .unwrap()
    }

    #[test]
    fn test_get_returns_stored_values() {
        let mut cache = SelectableValuesCache::new();
        let sig = SelectionSignature::default();
        assert!(cache.get("A", &sig).is_none());
        assert!(cache.put("A", &sig, strings(&["x", "y"]), 1));
        assert_eq!(cache.get("A", &sig).unwrap(), ["x", "y"]);
    }

    #[test]
    fn test_put_keeps_newer_epoch() {
        let mut cache = SelectableValuesCache::new();
        let sig = SelectionSignature::default();
        assert!(cache.put("A", &sig, strings(&["new"]), 5));
        assert!(!cache.put("A", &sig, strings(&["old"]), 4));
        assert!(cache.put("A", &sig, strings(&["same"]), 5));
        assert_eq!(cache.get("A", &sig).unwrap(), ["same"]);
    }

    #[test]
    fn test_invalidate_descendants_hides_entries_under_any_signature() {
        let h = chain();
        let mut selections = FilterSelectionState::new();
        selections.set("A", strings(&["1"]));
        let sig = SelectionSignature::of(&h, &selections, "C");

        let mut cache = SelectableValuesCache::new();
        cache.put("A", &SelectionSignature::default(), strings(&["a"]), 1);
        cache.put("B", &sig, strings(&["b"]), 1);
        cache.put("C", &sig, strings(&["c"]), 1);
        cache.put("Other", &SelectionSignature::default(), strings(&["o"]), 1);

        cache.invalidate_descendants(&h, "A", 2);

        // Same signature value, but the entries predate the invalidation
        assert!(cache.get("B", &sig).is_none());
        assert!(cache.get("C", &sig).is_none());
        assert!(cache.get("A", &SelectionSignature::default()).is_none());
        assert!(cache.get("Other", &SelectionSignature::default()).is_some());
        assert_eq!(cache.len(), 1);
        // The changed filter itself may still take results in flight
        assert!(!cache.is_superseded("A", 1));
    }

    #[test]
    fn test_put_from_superseded_resolution_is_rejected() {
        let h = chain();
        let mut cache = SelectableValuesCache::new();
        let sig = SelectionSignature::default();
        cache.invalidate_descendants(&h, "A", 7);
        assert!(cache.is_superseded("B", 6));
        assert!(!cache.put("B", &sig, strings(&["late"]), 6));
        assert!(cache.put("B", &sig, strings(&["fresh"]), 7));
        assert!(!cache.is_superseded("B", 7));
    }

    #[test]
    fn test_floor_never_moves_backwards() {
        let mut cache = SelectableValuesCache::new();
        cache.invalidate("A", 9);
        cache.invalidate("A", 3);
        assert!(cache.is_superseded("A", 8));
    }
}
