//! Event bridge: host-observable picker events.
//!
//! The dispatcher publishes here; hosts subscribe through their
//! [`SessionHandle`](crate::SessionHandle) and never see raw envelopes on the
//! port. Each session owns its own bridge.

use picker_core::messages::{CommandEnvelope, NotificationEnvelope, PickedItem};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default number of undelivered events a slow subscriber may lag behind.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Well-known event names, matching what browser hosts listen for.
pub mod names {
    pub const NOTIFICATION: &str = "pickernotification";
    pub const CHANGE: &str = "pickerchange";
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerEvent {
    /// Diagnostic notification forwarded from the frame.
    Notification(NotificationEnvelope),
    /// The picker produced a terminal outcome.
    Change(PickerChange),
}

impl PickerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PickerEvent::Notification(_) => names::NOTIFICATION,
            PickerEvent::Change(_) => names::CHANGE,
        }
    }
}

/// A terminal outcome plus the command envelope that carried it.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerChange {
    pub outcome: PickerOutcome,
    pub envelope: CommandEnvelope,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerOutcome {
    Picked(Vec<PickedItem>),
    Closed,
}

impl PickerChange {
    pub fn new(outcome: PickerOutcome, envelope: CommandEnvelope) -> Self {
        Self { outcome, envelope }
    }
}

/// Per-session publisher.
#[derive(Debug, Clone)]
pub struct EventBridge {
    tx: broadcast::Sender<PickerEvent>,
}

impl EventBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PickerEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Events with no subscriber are dropped.
    pub fn emit(&self, event: PickerEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(n) => trace!(event = name, subscribers = n, "event emitted"),
            Err(_) => trace!(event = name, "event dropped, no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Wait for the next change event, skipping notifications.
///
/// Returns `None` once the session's bridge is gone.
pub async fn next_change(rx: &mut broadcast::Receiver<PickerEvent>) -> Option<PickerChange> {
    loop {
        match rx.recv().await {
            Ok(PickerEvent::Change(change)) => return Some(change),
            Ok(PickerEvent::Notification(_)) => continue,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event subscriber lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
