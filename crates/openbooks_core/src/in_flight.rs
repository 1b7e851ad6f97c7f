use std::collections::VecDeque;

use crate::RequestId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightEntry {
    pub book: String,
    pub request_id: RequestId,
}

/// Download requests that were sent but have not produced a file yet, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InFlightTracker {
    queue: VecDeque<InFlightEntry>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `book` is already in flight.
    pub fn mark_sent(&mut self, book: impl Into<String>, request_id: RequestId) -> bool {
        let book = book.into();
        if self.is_in_flight(&book) {
            return false;
        }
        self.queue.push_back(InFlightEntry { book, request_id });
        true
    }

    /// Pop the oldest entry. Responses without a request id can only be
    /// matched in send order.
    pub fn mark_resolved(&mut self) -> Option<InFlightEntry> {
        self.queue.pop_front()
    }

    pub fn resolve_request(&mut self, request_id: RequestId) -> Option<InFlightEntry> {
        let index = self
            .queue
            .iter()
            .position(|entry| entry.request_id == request_id)?;
        self.queue.remove(index)
    }

    /// Empty the tracker, oldest entry first.
    pub fn release_all(&mut self) -> Vec<InFlightEntry> {
        self.queue.drain(..).collect()
    }

    pub fn is_in_flight(&self, book: &str) -> bool {
        self.queue.iter().any(|entry| entry.book == book)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn books(&self) -> Vec<String> {
        self.queue.iter().map(|entry| entry.book.clone()).collect()
    }
}
