//! Append-only event log with per-match monotonic ids
//!
//! Ids are handed out on append and never reused, with one exception: an
//! undo rewinds the log to a snapshot, truncating entries and resetting
//! `next_id`, so the next append reuses the first undone id. Every rewind
//! bumps the stream's epoch; cursor consumers treat an epoch change or an
//! id regression as a reset.

use crate::event::Event;
use serde::{Deserialize, Serialize};

/// An event once it has been appended to the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStreamEntry<E> {
    pub id: u64,
    pub event: Event<E>,
}

/// The per-match event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStream<E> {
    entries: Vec<EventStreamEntry<E>>,
    next_id: u64,
    #[serde(default)]
    epoch: u64,
}

impl<E> Default for EventStream<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            epoch: 0,
        }
    }
}

impl<E: Clone> EventStream<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events, assigning ids. Returns the appended entries.
    ///
    /// `max_entries` of 0 keeps everything; otherwise the oldest entries are
    /// trimmed. Trimming never touches `next_id`.
    pub fn append(&mut self, events: Vec<Event<E>>, max_entries: usize) -> Vec<EventStreamEntry<E>> {
        let mut appended = Vec::with_capacity(events.len());
        for event in events {
            let entry = EventStreamEntry {
                id: self.next_id,
                event,
            };
            self.next_id += 1;
            appended.push(entry.clone());
            self.entries.push(entry);
        }
        if max_entries > 0 && self.entries.len() > max_entries {
            let excess = self.entries.len() - max_entries;
            self.entries.drain(..excess);
        }
        appended
    }
}

impl<E> EventStream<E> {
    /// Id the next appended event will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn entries(&self) -> &[EventStreamEntry<E>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rewinds this stream has gone through
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Highest id still held, if any
    pub fn max_id(&self) -> Option<u64> {
        self.entries.last().map(|e| e.id)
    }

    /// Entries with an id strictly greater than `id`
    pub fn since(&self, id: u64) -> impl Iterator<Item = &EventStreamEntry<E>> {
        self.entries.iter().filter(move |e| e.id > id)
    }

    /// Truncate to the given id position (undo rewind)
    pub fn rewind_to(&mut self, next_id: u64) {
        self.entries.retain(|e| e.id < next_id);
        self.next_id = next_id;
        self.epoch += 1;
    }

    /// Drop entries with an id at or below `id`, keeping the counter
    pub fn drop_through(&mut self, id: u64) {
        self.entries.retain(|e| e.id > id);
    }

    /// Drop historical entries but keep the id counter.
    ///
    /// Used for `state:sync` payloads, which carry only the authoritative
    /// state and none of the history.
    pub fn strip(&mut self) {
        self.entries.clear();
    }
}
