//! Event types for the SnapShelf event system
//!
//! Provides the intake event definitions and the EventBus used to fan them
//! out to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Intake session events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// Selection replaced or cleared
    ///
    /// Any previously queued photos are no longer tracked.
    SelectionChanged {
        /// New item id, `None` when the selection was cleared
        item_id: Option<String>,
        /// Display title of the new item (empty when cleared)
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A photo from the watched folder was queued for the current item
    PhotoQueued {
        item_id: String,
        /// Path relative to the watched folder, `/` separated
        relative_path: String,
        queue_length: usize,
        timestamp: DateTime<Utc>,
    },

    /// A queued photo was removed by the user
    PhotoRemoved {
        item_id: String,
        relative_path: String,
        queue_length: usize,
        timestamp: DateTime<Utc>,
    },

    /// Queue order changed
    QueueReordered {
        item_id: String,
        queue_length: usize,
        timestamp: DateTime<Utc>,
    },

    /// Finalize snapshot taken, normalization starting
    FinalizeStarted {
        item_id: String,
        file_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Upload succeeded
    ///
    /// `warnings` lists the non-fatal follow-up failures (publish, cleanup, fallbacks).
    FinalizeCompleted {
        item_id: String,
        uploaded: usize,
        warnings: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Finalize aborted; selection and queue are unchanged
    FinalizeFailed {
        item_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::SelectionChanged { .. } => "SelectionChanged",
            IntakeEvent::PhotoQueued { .. } => "PhotoQueued",
            IntakeEvent::PhotoRemoved { .. } => "PhotoRemoved",
            IntakeEvent::QueueReordered { .. } => "QueueReordered",
            IntakeEvent::FinalizeStarted { .. } => "FinalizeStarted",
            IntakeEvent::FinalizeCompleted { .. } => "FinalizeCompleted",
            IntakeEvent::FinalizeFailed { .. } => "FinalizeFailed",
        }
    }
}

/// Broadcast bus for intake events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use snapshelf_common::events::{EventBus, IntakeEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(IntakeEvent::QueueReordered {
///     item_id: "42".to_string(),
///     queue_length: 3,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before lagging
    /// subscribers start missing old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: IntakeEvent) {
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
