use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSpeaker {
    User,
    Model,
}

/// A turn the backend sees as prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: TurnSpeaker,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: TurnSpeaker::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            speaker: TurnSpeaker::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendReply {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl BackendReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }

    pub fn with_usage(text: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            text: text.into(),
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
        }
    }
}

/// Text/structured generation backend.
pub trait ChatBackend: Send + Sync {
    /// Backend identifier (e.g. "echo", "compatible").
    fn name(&self) -> &str;

    /// Sends `message` on top of `history` and returns the reply.
    fn send<'a>(
        &'a self,
        model: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
        temperature: f64,
    ) -> BackendFuture<'a, BackendReply>;
}
