//! Transient acknowledgment highlights for written cells.
//!
//! A highlight is an overlay record, not a formatting change: the presentation
//! layer paints it on top of the cell until it expires. Writing the same target
//! again replaces its entry, which cancels the older expiry.

use crate::range::Range;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::{Duration, Instant};

pub const HIGHLIGHT_COLOR: &str = "#d4f5f0";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: u64,
    pub sheet: usize,
    pub range: Range,
    pub color: &'static str,
    #[serde(skip)]
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct HighlightScheduler {
    ttl: Duration,
    next_id: u64,
    entries: IndexMap<(usize, Range), Highlight>,
}

impl HighlightScheduler {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            entries: IndexMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Highlight `range` until `now + ttl`, superseding any live entry for the same target.
    pub fn schedule(&mut self, sheet: usize, range: Range, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        // shift_remove keeps insertion order meaningful: newest last.
        self.entries.shift_remove(&(sheet, range));
        self.entries.insert(
            (sheet, range),
            Highlight {
                id,
                sheet,
                range,
                color: HIGHLIGHT_COLOR,
                expires_at: now + self.ttl,
            },
        );
        id
    }

    /// Drop every entry whose deadline has passed and return them.
    pub fn expire(&mut self, now: Instant) -> Vec<Highlight> {
        let mut expired = Vec::new();
        self.entries.retain(|_, entry| {
            if entry.expires_at <= now {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.expires_at).min()
    }

    pub fn active(&self) -> impl Iterator<Item = &Highlight> {
        self.entries.values()
    }

    pub fn is_highlighted(&self, sheet: usize, row: u32, col: u32) -> bool {
        self.entries
            .values()
            .any(|entry| entry.sheet == sheet && entry.range.contains(row, col))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_pushes_deadline_back() {
        let start = Instant::now();
        let mut scheduler = HighlightScheduler::new(Duration::from_millis(1500));
        let first = scheduler.schedule(0, Range::cell(1, 1), start);
        let second = scheduler.schedule(0, Range::cell(1, 1), start + Duration::from_millis(1000));
        assert_ne!(first, second);
        assert_eq!(scheduler.len(), 1);

        assert!(scheduler.expire(start + Duration::from_millis(1600)).is_empty());
        assert!(scheduler.is_highlighted(0, 1, 1));

        let expired = scheduler.expire(start + Duration::from_millis(2500));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, second);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn next_deadline_tracks_earliest_entry() {
        let start = Instant::now();
        let mut scheduler = HighlightScheduler::new(Duration::from_millis(100));
        assert_eq!(scheduler.next_deadline(), None);
        scheduler.schedule(0, Range::cell(0, 0), start);
        scheduler.schedule(1, Range::cell(0, 0), start + Duration::from_millis(50));
        assert_eq!(
            scheduler.next_deadline(),
            Some(start + Duration::from_millis(100))
        );
    }
}
