//! Event-stream cursor and rollback signal
//!
//! UI and animation code reads "what is new since I last looked" through
//! [`EventStreamCursor::consume_new`]. The session publishes a
//! [`RollbackSignal`] whenever the rendered state jumps in a way forward
//! consumption cannot explain.

use serde::{Deserialize, Serialize};
use tabula_core::{EventStream, EventStreamEntry};
use tracing::debug;

/// Published by the session, read by every cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackSignal {
    /// Bumped on every rollback
    pub seq: u64,
    /// Bumped when a reconcile kept predictions and the cursor should
    /// quietly realign
    pub reconcile_seq: u64,
    /// Highest already-played event id of the last rollback; `None` asks
    /// for a full resync unless `from_start` is set
    pub watermark: Option<u64>,
    /// The last rollback replaced every event the cursor may have played
    #[serde(default)]
    pub from_start: bool,
}

impl RollbackSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rollback(&mut self, watermark: Option<u64>) {
        self.seq += 1;
        self.watermark = watermark;
        self.from_start = false;
    }

    /// Roll back so that every event from `first_replaced` on is played again
    pub fn rewind(&mut self, first_replaced: u64) {
        self.seq += 1;
        self.watermark = first_replaced.checked_sub(1);
        self.from_start = first_replaced == 0;
    }

    pub fn reconciled(&mut self) {
        self.reconcile_seq += 1;
    }
}

/// What a cursor call yields
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeResult<E> {
    /// Entries not seen before, oldest first
    pub entries: Vec<EventStreamEntry<E>>,
    /// The stream was rewound (undo); consumers drop derived UI state
    pub did_reset: bool,
    /// A rollback or resync happened; consumers drop visual sequencing
    pub did_optimistic_rollback: bool,
}

impl<E> ConsumeResult<E> {
    fn nothing() -> Self {
        Self {
            entries: Vec::new(),
            did_reset: false,
            did_optimistic_rollback: false,
        }
    }
}

/// Tracks the last event id a consumer has seen
#[derive(Debug, Clone)]
pub struct EventStreamCursor {
    last_seen: Option<u64>,
    first_call: bool,
    reconnect_token: u64,
    rollback_seq: u64,
    reconcile_seq: u64,
    epoch: u64,
}

impl EventStreamCursor {
    /// A cursor that ignores whatever the signal already says
    pub fn new(signal: &RollbackSignal, reconnect_token: u64) -> Self {
        Self {
            last_seen: None,
            first_call: true,
            reconnect_token,
            rollback_seq: signal.seq,
            reconcile_seq: signal.reconcile_seq,
            epoch: 0,
        }
    }

    /// Last id consumed, if any
    pub fn cursor(&self) -> Option<u64> {
        self.last_seen
    }

    /// Skip everything currently in the stream
    pub fn reset_to_latest<E>(&mut self, stream: &EventStream<E>) {
        self.epoch = stream.epoch();
        if let Some(max) = stream.max_id() {
            self.last_seen = Some(max);
        }
    }

    /// Entries appended since the last call.
    ///
    /// Checks run in a fixed order: reconnect, rollback, silent reconcile,
    /// first call, undo (epoch change or id regression), empty stream, then
    /// forward consumption.
    pub fn consume_new<E: Clone>(
        &mut self,
        stream: &EventStream<E>,
        signal: &RollbackSignal,
        reconnect_token: u64,
    ) -> ConsumeResult<E> {
        if reconnect_token != self.reconnect_token {
            self.reconnect_token = reconnect_token;
            self.reset_to_latest(stream);
            return ConsumeResult::nothing();
        }

        if signal.seq != self.rollback_seq {
            self.rollback_seq = signal.seq;
            self.epoch = stream.epoch();
            let entries = match signal.watermark {
                Some(watermark) => {
                    self.last_seen = Some(watermark);
                    self.take_since(stream, watermark)
                }
                None if signal.from_start => {
                    self.last_seen = None;
                    self.take_all(stream)
                }
                None => {
                    self.reset_to_latest(stream);
                    Vec::new()
                }
            };
            debug!(watermark = ?signal.watermark, replayed = entries.len(), "cursor rolled back");
            return ConsumeResult {
                entries,
                did_reset: false,
                did_optimistic_rollback: true,
            };
        }

        if signal.reconcile_seq != self.reconcile_seq {
            self.reconcile_seq = signal.reconcile_seq;
            self.reset_to_latest(stream);
            return ConsumeResult::nothing();
        }

        if self.first_call {
            self.first_call = false;
            self.reset_to_latest(stream);
            return ConsumeResult::nothing();
        }

        // Appends after an undo can push next_id back past the cursor, so the
        // epoch is the primary check.
        let rewound = stream.epoch() != self.epoch;
        let regressed = self.last_seen.is_some_and(|seen| stream.next_id() <= seen);
        if rewound || regressed {
            debug!(
                cursor = ?self.last_seen,
                next_id = stream.next_id(),
                epoch = stream.epoch(),
                "event stream rewound"
            );
            self.epoch = stream.epoch();
            self.last_seen = stream.max_id();
            return ConsumeResult {
                entries: Vec::new(),
                did_reset: true,
                did_optimistic_rollback: false,
            };
        }
        if stream.is_empty() {
            return ConsumeResult::nothing();
        }

        let entries = match self.last_seen {
            Some(seen) => self.take_since(stream, seen),
            None => self.take_all(stream),
        };
        ConsumeResult {
            entries,
            did_reset: false,
            did_optimistic_rollback: false,
        }
    }

    fn take_all<E: Clone>(&mut self, stream: &EventStream<E>) -> Vec<EventStreamEntry<E>> {
        let entries = stream.entries().to_vec();
        if let Some(last) = entries.last() {
            self.last_seen = Some(last.id);
        }
        entries
    }

    fn take_since<E: Clone>(&mut self, stream: &EventStream<E>, id: u64) -> Vec<EventStreamEntry<E>> {
        let entries: Vec<_> = stream.since(id).cloned().collect();
        if let Some(last) = entries.last() {
            self.last_seen = Some(last.id);
        }
        entries
    }
}
