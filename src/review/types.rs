use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Observable view of a queued request. Carries no way to settle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequestData {
    pub id: String,
    pub title: String,
    pub prompt: String,
}

/// How a reviewer settles a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Send this payload (the original or an edit).
    Approved(String),
    Rejected,
}

impl ReviewOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Queue entry. The responder is owned by the gate until the entry leaves
/// the queue.
pub(super) struct PendingRequest {
    pub(super) data: PendingRequestData,
    pub(super) responder: oneshot::Sender<ReviewOutcome>,
}
