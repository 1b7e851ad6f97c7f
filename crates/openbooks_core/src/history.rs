use std::collections::VecDeque;

use engine_logging::engine_debug;
use serde::{Deserialize, Serialize};

use crate::{BookDetail, ParseError};

/// Maximum number of searches kept in the history log.
pub const HISTORY_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub query: String,
    /// Creation time in milliseconds. Unique within a log.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<BookDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ParseError>>,
}

impl HistoryItem {
    pub fn pending(query: impl Into<String>, timestamp: i64) -> Self {
        Self {
            query: query.into(),
            timestamp,
            results: None,
            errors: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.results.is_none() && self.errors.is_none()
    }
}

/// Newest-first, capacity bounded search log plus the active selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryStore {
    items: VecDeque<HistoryItem>,
    active: Option<i64>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. Extra items past capacity are dropped and a
    /// dangling active selection is cleared.
    pub fn from_parts(items: Vec<HistoryItem>, active: Option<i64>) -> Self {
        let mut items: VecDeque<HistoryItem> = items.into();
        items.truncate(HISTORY_CAPACITY);
        let active = active.filter(|ts| items.iter().any(|item| item.timestamp == *ts));
        Self { items, active }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    pub fn get(&self, timestamp: i64) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.timestamp == timestamp)
    }

    pub fn active(&self) -> Option<i64> {
        self.active
    }

    pub fn active_item(&self) -> Option<&HistoryItem> {
        self.active.and_then(|ts| self.get(ts))
    }

    pub fn to_vec(&self) -> Vec<HistoryItem> {
        self.items.iter().cloned().collect()
    }

    /// Prepend a pending search and return its timestamp.
    ///
    /// `now` is bumped past the newest entry if needed so timestamps stay unique.
    pub fn add_pending(&mut self, query: impl Into<String>, now: i64) -> i64 {
        let timestamp = match self.items.front() {
            Some(newest) if now <= newest.timestamp => newest.timestamp + 1,
            _ => now,
        };
        self.items.push_front(HistoryItem::pending(query, timestamp));

        while self.items.len() > HISTORY_CAPACITY {
            if let Some(evicted) = self.items.pop_back() {
                engine_debug!(
                    "History full, evicting query={:?} ts={}",
                    evicted.query,
                    evicted.timestamp
                );
                if self.active == Some(evicted.timestamp) {
                    self.active = None;
                }
            }
        }
        timestamp
    }

    /// Fill in results for a pending item. Returns false when the item is
    /// missing or already resolved; nothing is mutated in that case.
    pub fn resolve(
        &mut self,
        timestamp: i64,
        results: Vec<BookDetail>,
        errors: Vec<ParseError>,
    ) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| item.timestamp == timestamp)
        {
            Some(item) if item.is_pending() => {
                item.results = Some(results);
                item.errors = Some(errors);
                true
            }
            _ => false,
        }
    }

    /// Remove the item with `timestamp`, or the oldest item when `None`.
    pub fn delete(&mut self, timestamp: Option<i64>) -> Option<HistoryItem> {
        let removed = match timestamp {
            Some(ts) => {
                let index = self.items.iter().position(|item| item.timestamp == ts)?;
                self.items.remove(index)
            }
            None => self.items.pop_back(),
        }?;
        if self.active == Some(removed.timestamp) {
            self.active = None;
        }
        Some(removed)
    }

    /// Change the active selection. Unknown timestamps leave it untouched.
    pub fn select(&mut self, timestamp: Option<i64>) -> bool {
        match timestamp {
            Some(ts) if self.get(ts).is_none() => false,
            _ => {
                self.active = timestamp;
                true
            }
        }
    }

    /// Remove every pending item, clearing the active selection if it was one of them.
    pub fn drop_pending(&mut self) -> Vec<HistoryItem> {
        let (pending, kept): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(HistoryItem::is_pending);
        self.items = kept.into();
        if self
            .active
            .is_some_and(|ts| pending.iter().any(|item| item.timestamp == ts))
        {
            self.active = None;
        }
        pending
    }

    pub fn most_recent_pending(&self) -> Option<i64> {
        self.items
            .iter()
            .find(|item| item.is_pending())
            .map(|item| item.timestamp)
    }

    pub fn pending_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_pending()).count()
    }
}
