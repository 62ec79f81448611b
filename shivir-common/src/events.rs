//! Event types and EventBus for the shivir attendance workspace
//!
//! The EventBus is the Notifier seam: voice, UI and audit consumers subscribe
//! and receive every classified attendance outcome. The engine never waits on
//! a subscriber and never formats the message itself.

use crate::model::SessionType;
use crate::outcome::Outcome;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shivir event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShivirEvent {
    /// One recognition event was classified
    ///
    /// Triggers:
    /// - Voice: speak the message for `outcome`
    /// - UI: show the person card and status
    AttendanceOutcome {
        /// Classified result, including its extra fields
        outcome: Outcome,
        /// Identity, when the face (or email) was resolved
        person_id: Option<Uuid>,
        /// Display name, when the identity was resolved
        person_name: Option<String>,
        /// Gender tag ('M'/'F'), used by voice selection
        gender: Option<String>,
        /// Active session type, when one was active
        session_type: Option<SessionType>,
        /// When the attempt was evaluated
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A completion moved a person's curriculum level forward
    LevelAdvanced {
        person_id: Uuid,
        /// Level before the completion (`None` = new user)
        previous_level: Option<SessionType>,
        new_level: SessionType,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast channel for [`ShivirEvent`]s
pub struct EventBus {
    tx: broadcast::Sender<ShivirEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use shivir_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ShivirEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ShivirEvent,
    ) -> Result<usize, broadcast::error::SendError<ShivirEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ShivirEvent) {
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
