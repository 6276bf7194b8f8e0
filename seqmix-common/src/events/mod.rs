//! Event types for the seqmix event system
//!
//! Provides the shared event definitions and the EventBus the live scheduler
//! publishes on. Consumers (a UI layer, the CLI, survey loggers) subscribe and
//! receive every event emitted after subscription.

mod scheduler_types;

pub use scheduler_types::{PendingSurvey, SchedulerState, SchedulerStatus, SurveyResponse};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Seqmix event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeqmixEvent {
    /// Scheduler state changed
    StateChanged {
        /// State before change
        old_state: SchedulerState,
        /// State after change
        new_state: SchedulerState,
        /// When state changed
        timestamp: DateTime<Utc>,
    },

    /// A segment's output path was created and started
    SegmentStarted {
        /// Segment index in template order
        index: usize,
        /// Segment label
        label: String,
        /// True when started early, overlapping the previous segment's fade-out
        crossfade: bool,
        /// Session the segment belongs to
        session: u64,
        timestamp: DateTime<Utc>,
    },

    /// A segment reached its natural end
    SegmentFinished {
        index: usize,
        session: u64,
        timestamp: DateTime<Utc>,
    },

    /// Playback paused at the survey gate
    SurveyPending {
        after_index: usize,
        question: String,
        options: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Listener answered the survey
    ///
    /// This is the only place the response leaves the scheduler; loggers that
    /// need to keep responses subscribe to it.
    SurveyAnswered {
        response: SurveyResponse,
    },

    /// Human-readable diagnostic log line (already timestamp-prefixed)
    Log {
        line: String,
    },
}

/// Event bus for one-to-many event broadcasting
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and lose
/// the oldest events rather than blocking the scheduler.
///
/// # Examples
///
/// ```
/// use seqmix_common::events::{EventBus, SeqmixEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(SeqmixEvent::Log { line: "[00:00:00.000] hello".to_string() });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SeqmixEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Panics
    /// Panics if `capacity` is zero (see `tokio::sync::broadcast::channel`);
    /// configuration validation rejects a zero capacity earlier.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SeqmixEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SeqmixEvent,
    ) -> Result<usize, broadcast::error::SendError<SeqmixEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SeqmixEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
