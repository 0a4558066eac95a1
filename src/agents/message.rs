use super::roles::AgentRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Model,
}

/// Prompt provenance attached to a message for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMetadata {
    /// Backend model identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Template before substitution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_prompt: Option<String>,
    /// Text actually sent, after substitution and any review edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_prompt: Option<String>,
}

impl PromptMetadata {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.dynamic_prompt = Some(template.into());
        self
    }

    pub fn with_final_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.final_prompt = Some(prompt.into());
        self
    }
}

/// One immutable turn in an agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: String,
    pub role: MessageRole,
    pub agent_role: AgentRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_prompt: Option<String>,
    /// Structured payload parsed from `content`, when it was machine-readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl AgentMessage {
    pub fn new(agent_role: AgentRole, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            agent_role,
            content: content.into(),
            timestamp: Utc::now(),
            model: None,
            dynamic_prompt: None,
            final_prompt: None,
            data: None,
        }
    }

    pub fn with_metadata(mut self, metadata: PromptMetadata) -> Self {
        self.model = metadata.model;
        self.dynamic_prompt = metadata.dynamic_prompt;
        self.final_prompt = metadata.final_prompt;
        self
    }

    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data;
        self
    }
}

/// Broadcast payload: which role produced the message, and the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub role: AgentRole,
    pub message: AgentMessage,
}
