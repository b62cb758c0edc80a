//! Weighted Misra–Gries majority counter
//!
//! Tracks at most `K` candidate materials. When a material holds a strict
//! majority of the total weight it is guaranteed to survive as the top
//! candidate. Without a true majority the returned material is one of the
//! heavy hitters but not necessarily the most frequent one.

use super::node::Material;

/// Candidate slots used when collapsing a level of detail
pub const LOD_CANDIDATES: usize = 4;

/// Fixed-size heavy-hitter counter over material ids
#[derive(Clone, Debug)]
pub struct MajorityCounter<const K: usize> {
    keys: [Material; K],
    counts: [u64; K],
}

impl<const K: usize> Default for MajorityCounter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> MajorityCounter<K> {
    pub fn new() -> Self {
        assert!(K > 0, "majority counter needs at least one slot");
        Self {
            keys: [0; K],
            counts: [0; K],
        }
    }

    pub fn clear(&mut self) {
        self.keys = [0; K];
        self.counts = [0; K];
    }

    /// Count one occurrence of `key`
    pub fn count(&mut self, key: Material) {
        self.count_weighted(key, 1);
    }

    /// Count `weight` occurrences of `key`
    pub fn count_weighted(&mut self, key: Material, weight: u64) {
        if weight == 0 {
            return;
        }

        if let Some(slot) = (0..K).find(|&i| self.counts[i] > 0 && self.keys[i] == key) {
            self.counts[slot] += weight;
            return;
        }

        if let Some(slot) = (0..K).find(|&i| self.counts[i] == 0) {
            self.keys[slot] = key;
            self.counts[slot] = weight;
            return;
        }

        // All slots busy: cancel against the lightest candidate
        let (slot, lightest) = self
            .counts
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|&(_, c)| c)
            .unwrap_or((0, 0));
        let cancel = lightest.min(weight);
        if lightest < weight {
            self.keys[slot] = key;
            self.counts[slot] = weight;
        }
        for count in &mut self.counts {
            *count = count.saturating_sub(cancel);
        }
    }

    /// Candidate with the highest remaining count (0 when nothing was counted)
    pub fn majority(&self) -> Material {
        let mut best = 0;
        for i in 1..K {
            if self.counts[i] > self.counts[best] {
                best = i;
            }
        }
        if self.counts[best] == 0 { 0 } else { self.keys[best] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_counter() {
        let counter: MajorityCounter<4> = MajorityCounter::new();
        assert_eq!(counter.majority(), 0);
    }

    #[test]
    fn test_true_majority_survives_eviction() {
        let mut counter: MajorityCounter<2> = MajorityCounter::new();
        // 7 wins 5 of 9 votes, interleaved with three distinct rivals
        for key in [7, 1, 7, 2, 7, 3, 7, 1, 7] {
            counter.count(key);
        }
        assert_eq!(counter.majority(), 7);
    }

    #[test]
    fn test_weighted_majority() {
        let mut counter: MajorityCounter<LOD_CANDIDATES> = MajorityCounter::new();
        counter.count_weighted(0, 3);
        counter.count_weighted(5, 8);
        counter.count_weighted(0, 2);
        counter.count_weighted(9, 1);
        assert_eq!(counter.majority(), 5);
    }

    #[test]
    fn test_heavy_newcomer_replaces_lightest() {
        let mut counter: MajorityCounter<2> = MajorityCounter::new();
        counter.count_weighted(1, 2);
        counter.count_weighted(2, 3);
        counter.count_weighted(3, 10);
        // Slot for 1 is replaced by 3 with 10 - 2 remaining; 2 drops to 1
        assert_eq!(counter.majority(), 3);
    }

    #[test]
    fn test_empty_material_can_win() {
        let mut counter: MajorityCounter<LOD_CANDIDATES> = MajorityCounter::new();
        for key in [0, 0, 0, 4, 0, 6] {
            counter.count(key);
        }
        assert_eq!(counter.majority(), 0);
    }

    #[test]
    fn test_clear_resets() {
        let mut counter: MajorityCounter<LOD_CANDIDATES> = MajorityCounter::new();
        counter.count_weighted(8, 100);
        counter.clear();
        counter.count(2);
        assert_eq!(counter.majority(), 2);
    }

    #[test]
    fn test_no_majority_returns_a_seen_key() {
        let mut counter: MajorityCounter<2> = MajorityCounter::new();
        let keys = [1, 2, 3, 4, 1, 2, 3, 4];
        for key in keys {
            counter.count(key);
        }
        let result = counter.majority();
        assert!(result == 0 || keys.contains(&result));
    }
}
