//! LRU (Least Recently Used) replacement policy.
//!
//! Sort runs and merge passes stream through pages once, while the header
//! pages of open heap files are touched on every chain walk; LRU keeps the
//! latter resident.

use std::collections::{HashMap, HashSet};

use crate::common::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
///
/// Eviction is a linear scan over evictable frames, which is fine for the
/// pool sizes a sort job is given.
#[derive(Default)]
pub struct LruReplacer {
    /// Logical clock, bumped on every access.
    tick: u64,
    /// Frame → tick of its most recent access.
    last_access: HashMap<FrameId, u64>,
    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame was accessed.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.tick += 1;
        self.last_access.insert(frame_id, self.tick);
    }

    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select and forget the least recently used evictable frame.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .evictable
            .iter()
            .min_by_key(|fid| self.last_access.get(*fid).copied().unwrap_or(0))
            .copied()?;

        self.remove(victim);
        Some(victim)
    }

    /// Stop tracking a frame (its page was freed).
    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable.remove(&frame_id);
        self.last_access.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacer_with(frames: &[usize]) -> LruReplacer {
        let mut replacer = LruReplacer::new();
        for &f in frames {
            replacer.record_access(FrameId::new(f));
            replacer.set_evictable(FrameId::new(f), true);
        }
        replacer
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut replacer = replacer_with(&[0, 1, 2]);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_reaccess_moves_to_back() {
        let mut replacer = replacer_with(&[0, 1, 2]);
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_skips_pinned() {
        let mut replacer = replacer_with(&[0, 1]);
        replacer.set_evictable(FrameId::new(0), false);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove() {
        let mut replacer = replacer_with(&[0, 1]);
        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }
}
