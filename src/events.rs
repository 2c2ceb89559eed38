//! Change notifications for external collaborators.
//!
//! Delivery is best-effort: the engine logs a failed [`EventSink::notify`]
//! and carries on.

use std::fmt;
use std::sync::mpsc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A view now shows a different workspace.
    ViewUpdated,
    /// A new snapshot was recorded for a workspace.
    WorkspaceSnapshotted,
    /// A view and its working copy were deleted.
    ViewRemoved,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ViewUpdated => "view_updated",
            Self::WorkspaceSnapshotted => "workspace_snapshotted",
            Self::ViewRemoved => "view_removed",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: UserId,
    pub kind: EventKind,
    /// Id of the view or workspace the event is about.
    pub reference_id: String,
}

impl Event {
    pub fn new(user_id: UserId, kind: EventKind, reference_id: impl fmt::Display) -> Self {
        Self {
            user_id,
            kind,
            reference_id: reference_id.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("event delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait EventSink: Send + Sync {
    fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Deliver `event`, logging instead of failing when the sink rejects it.
pub(crate) fn emit(sink: &dyn EventSink, event: &Event) {
    if let Err(e) = sink.notify(event) {
        tracing::warn!(kind = %event.kind, reference = %event.reference_id, error = %e, "event dropped");
    }
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn notify(&self, _event: &Event) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits each event as a `tracing` record.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        tracing::info!(
            user = %event.user_id,
            kind = %event.kind,
            reference = %event.reference_id,
            "event"
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Forwards events to a channel consumed elsewhere. Fails once the receiver
/// is gone.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<mpsc::Sender<Event>>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        self.tx
            .lock()
            .send(event.clone())
            .map_err(|_| NotifyError("receiver dropped".to_owned()))
    }
}
