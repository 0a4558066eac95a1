use super::roles::AgentRole;
use crate::llm::ChatTurn;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

/// Live conversation backing one agent role.
///
/// The turn list is what the backend sees; the registry keeps the richer
/// [`AgentMessage`](super::AgentMessage) history separately. Holding the turn
/// lock serializes exchanges on the session.
#[derive(Debug)]
pub struct AgentSession {
    id: String,
    role: AgentRole,
    model: String,
    created_at: DateTime<Utc>,
    turns: Mutex<Vec<ChatTurn>>,
}

impl AgentSession {
    pub(super) fn new(role: AgentRole, model: impl Into<String>, turns: Vec<ChatTurn>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            model: model.into(),
            created_at: Utc::now(),
            turns: Mutex::new(turns),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Snapshot of the backend-visible conversation.
    pub async fn turns(&self) -> Vec<ChatTurn> {
        self.turns.lock().await.clone()
    }

    pub(super) async fn lock_turns(&self) -> MutexGuard<'_, Vec<ChatTurn>> {
        self.turns.lock().await
    }
}
