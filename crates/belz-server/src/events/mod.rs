//! Proposal event bus.
//!
//! Delivery is at-most-once and best-effort: publishing never blocks or
//! fails, and a subscriber that falls behind skips what it missed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// SSE event name for proposal changes.
pub const PROPOSTA_UPDATE: &str = "proposta_update";

/// A change to a proposal, as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalEvent {
    /// Event name, always [`PROPOSTA_UPDATE`] today.
    #[serde(rename = "type")]
    pub kind: String,
    /// Id of the changed proposal.
    pub proposta_id: String,
    /// New status, when the change touched it.
    pub status: Option<String>,
    /// User who made the change.
    pub alterado_por: String,
    /// When the change was published.
    pub timestamp: DateTime<Utc>,
    /// Full row after the change, if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
}

impl ProposalEvent {
    /// Event for a status change made by `alterado_por`.
    pub fn status_changed(
        proposta_id: impl Into<String>,
        status: impl Into<String>,
        alterado_por: impl Into<String>,
    ) -> Self {
        Self {
            kind: PROPOSTA_UPDATE.to_string(),
            proposta_id: proposta_id.into(),
            status: Some(status.into()),
            alterado_por: alterado_por.into(),
            timestamp: Utc::now(),
            record: None,
        }
    }

    /// Attach the full row.
    pub fn with_record(mut self, record: Value) -> Self {
        self.record = Some(record);
        self
    }
}

/// Fan-out channel for [`ProposalEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProposalEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to current subscribers. Returns how many received it.
    pub fn publish(&self, event: ProposalEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(receivers, "Published proposal event");
                receivers
            }
            Err(_) => {
                trace!("Proposal event dropped, no subscribers");
                0
            }
        }
    }

    /// New receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProposalEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
