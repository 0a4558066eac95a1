//! OpenAI-compatible `/chat/completions` backend.
//! Works against any gateway that speaks that format.

use super::scrub::sanitize_api_error;
use super::traits::{BackendFuture, BackendReply, ChatBackend, ChatTurn, TurnSpeaker};
use crate::error::BackendError;
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct CompatibleBackend {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    /// Pre-computed chat completions URL (avoids `format!` per request).
    cached_chat_url: String,
    client: Client,
}

impl CompatibleBackend {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let cached_chat_url = if base_url.contains("chat/completions") {
            base_url.clone()
        } else {
            format!("{base_url}/chat/completions")
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            name: name.to_string(),
            base_url,
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(ToString::to_string),
            cached_chat_url,
            client,
        }
    }

    fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }

    fn build_request(
        model: &str,
        history: &[ChatTurn],
        message: &str,
        temperature: f64,
    ) -> ChatRequest {
        let mut messages: Vec<Message> = history
            .iter()
            .map(|turn| Message {
                role: match turn.speaker {
                    TurnSpeaker::User => "user",
                    TurnSpeaker::Model => "assistant",
                },
                content: turn.text.clone(),
            })
            .collect();
        messages.push(Message {
            role: "user",
            content: message.to_string(),
        });

        ChatRequest {
            model: model.to_string(),
            messages,
            temperature,
        }
    }

    async fn call_chat_completions(&self, request: &ChatRequest) -> anyhow::Result<BackendReply> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(BackendError::MissingApiKey {
                backend: self.name.clone(),
            }
            .into());
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("{} chat completions request failed", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                tracing::warn!(backend = %self.name, error = %sanitize_api_error(&body), "backend.auth_failed");
                return Err(BackendError::Auth {
                    backend: self.name.clone(),
                }
                .into());
            }
            return Err(BackendError::Request {
                backend: self.name.clone(),
                message: format!("{status}: {}", sanitize_api_error(&body)),
            }
            .into());
        }

        let chat: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BackendError::EmptyReply {
                backend: self.name.clone(),
            })?;

        Ok(match chat.usage {
            Some(usage) => BackendReply::with_usage(text, usage.prompt_tokens, usage.completion_tokens),
            None => BackendReply::text_only(text),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatBackend for CompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(
        &'a self,
        model: &'a str,
        history: &'a [ChatTurn],
        message: &'a str,
        temperature: f64,
    ) -> BackendFuture<'a, BackendReply> {
        Box::pin(async move {
            let request = Self::build_request(model, history, message, temperature);
            self.call_chat_completions(&request).await
        })
    }
}
