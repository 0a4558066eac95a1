use super::message::{AgentMessage, MessageEvent, MessageRole, PromptMetadata};
use super::roles::AgentRole;
use super::session::AgentSession;
use super::structured::try_parse_structured;
use crate::error::SessionError;
use crate::events::{EventBus, Subscription};
use crate::llm::{ChatBackend, ChatTurn};
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use crate::usage::UsageMeter;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Default)]
struct RoleState {
    session: Option<Arc<AgentSession>>,
    history: Vec<AgentMessage>,
}

/// One persistent conversation per [`AgentRole`], with full message history
/// and a broadcast of every recorded message.
///
/// History writes happen inside the bus dispatch section, so subscribers see
/// messages in exactly the order they were appended, and a subscriber that
/// reads [`AgentSessionRegistry::get_history`] from its callback already
/// finds the message it was notified about.
pub struct AgentSessionRegistry {
    backend: Arc<dyn ChatBackend>,
    temperature: f64,
    roles: Mutex<HashMap<AgentRole, RoleState>>,
    bus: EventBus<MessageEvent>,
    usage: Option<Arc<UsageMeter>>,
    observer: Arc<dyn Observer>,
}

impl AgentSessionRegistry {
    pub fn new(backend: Arc<dyn ChatBackend>, temperature: f64) -> Self {
        Self {
            backend,
            temperature,
            roles: Mutex::new(HashMap::new()),
            bus: EventBus::default(),
            usage: None,
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: Arc<UsageMeter>) -> Self {
        self.usage = Some(usage);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Returns the session for `role`, creating it on first use.
    ///
    /// A new session is primed with `system_instruction` (a user turn with
    /// the instruction and a model turn acknowledging the role), and the
    /// priming is recorded and broadcast as one `system` message carrying
    /// `metadata`. An existing session is returned as is; the arguments are
    /// then ignored.
    pub fn get_agent(
        &self,
        role: AgentRole,
        model: &str,
        system_instruction: Option<&str>,
        metadata: Option<PromptMetadata>,
    ) -> Arc<AgentSession> {
        let (session, created) = self.bus.publish_returning(|| {
            let mut roles = self.lock_roles();
            let state = roles.entry(role).or_default();
            if let Some(session) = &state.session {
                return (None, (Arc::clone(session), false));
            }

            let turns = system_instruction.map_or_else(Vec::new, |instruction| {
                vec![
                    ChatTurn::user(instruction),
                    ChatTurn::model(role.acknowledgement()),
                ]
            });
            let session = Arc::new(AgentSession::new(role, model, turns));
            state.session = Some(Arc::clone(&session));

            let event = system_instruction.map(|instruction| {
                let metadata = metadata.unwrap_or_else(|| PromptMetadata::for_model(model));
                let message = AgentMessage::new(role, MessageRole::System, instruction)
                    .with_metadata(metadata);
                state.history.push(message.clone());
                MessageEvent { role, message }
            });
            (event, (session, true))
        });

        if created {
            info!(role = %role, model, primed = system_instruction.is_some(), "agent session created");
            self.observer.record_event(&ObserverEvent::SessionCreated {
                role: role.to_string(),
                primed: system_instruction.is_some(),
            });
        }
        session
    }

    /// Current session for `role`, if one was created and not reset.
    pub fn session(&self, role: AgentRole) -> Option<Arc<AgentSession>> {
        self.lock_roles()
            .get(&role)
            .and_then(|state| state.session.clone())
    }

    /// Sends `text` on `session` and returns the raw reply.
    ///
    /// The user message is recorded and broadcast before the backend is
    /// called and stays in history if the call fails. Backend errors are
    /// returned unchanged. On success the reply is recorded as a `model`
    /// message with any structured payload parsed from it.
    pub async fn send_message(
        &self,
        role: AgentRole,
        session: &AgentSession,
        text: &str,
        metadata: Option<PromptMetadata>,
    ) -> Result<String> {
        if session.role() != role {
            return Err(SessionError::RoleMismatch {
                expected: role.to_string(),
                actual: session.role().to_string(),
            }
            .into());
        }

        let mut turns = session.lock_turns().await;

        let metadata = metadata.unwrap_or_else(|| PromptMetadata::for_model(session.model()));
        let user = AgentMessage::new(role, MessageRole::User, text).with_metadata(metadata);
        if !self.record_for(session, user) {
            return Err(SessionError::Stale {
                role: role.to_string(),
            }
            .into());
        }

        let started = Instant::now();
        let result = self
            .backend
            .send(session.model(), &turns, text, self.temperature)
            .await;
        let duration = started.elapsed();
        self.observer.record_event(&ObserverEvent::BackendCall {
            role: role.to_string(),
            model: session.model().to_string(),
            duration,
            success: result.is_ok(),
        });
        self.observer
            .record_metric(&ObserverMetric::RequestLatency(duration));

        let reply = result?;
        self.record_usage(role, session.model(), reply.input_tokens, reply.output_tokens);

        turns.push(ChatTurn::user(text));
        turns.push(ChatTurn::model(reply.text.clone()));

        let message = AgentMessage::new(role, MessageRole::Model, reply.text.clone())
            .with_metadata(PromptMetadata::for_model(session.model()))
            .with_data(try_parse_structured(&reply.text));
        if !self.record_for(session, message) {
            debug!(role = %role, "session reset during exchange; reply not recorded");
        }

        Ok(reply.text)
    }

    /// Full history for `role` in creation order.
    pub fn get_history(&self, role: AgentRole) -> Vec<AgentMessage> {
        self.lock_roles()
            .get(&role)
            .map(|state| state.history.clone())
            .unwrap_or_default()
    }

    /// Roles that currently have a session or history, in role order.
    pub fn active_roles(&self) -> Vec<AgentRole> {
        let mut roles: Vec<AgentRole> = self
            .lock_roles()
            .iter()
            .filter(|(_, state)| state.session.is_some() || !state.history.is_empty())
            .map(|(role, _)| *role)
            .collect();
        roles.sort();
        roles
    }

    /// Appends a pre-built message without calling the backend, and adds it
    /// to the live session's turns so later exchanges remember it.
    pub async fn inject_message(&self, role: AgentRole, mut message: AgentMessage) {
        if message.agent_role != role {
            debug!(role = %role, from = %message.agent_role, "re-tagging injected message");
            message.agent_role = role;
        }

        let Some(session) = self.session(role) else {
            self.record(role, message);
            return;
        };

        let mut turns = session.lock_turns().await;
        let turn = match message.role {
            MessageRole::Model => ChatTurn::model(message.content.clone()),
            MessageRole::User | MessageRole::System => ChatTurn::user(message.content.clone()),
        };
        if self.record_for(&session, message) {
            turns.push(turn);
        } else {
            debug!(role = %role, "session reset during inject; message not recorded");
        }
    }

    /// Drops the session and history of `role`. The next
    /// [`AgentSessionRegistry::get_agent`] starts over, priming included.
    pub fn reset_memory(&self, role: AgentRole) {
        let removed = self.lock_roles().remove(&role);
        let had_messages = removed.as_ref().map_or(0, |state| state.history.len());
        info!(role = %role, cleared = had_messages, "agent memory reset");
        self.observer.record_event(&ObserverEvent::SessionReset {
            role: role.to_string(),
        });
    }

    /// Registers a message listener. Listeners run synchronously on the
    /// recording thread, in registration order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn receiver(&self) -> broadcast::Receiver<MessageEvent> {
        self.bus.receiver()
    }

    /// Appends and broadcasts `message` if `session` is still the role's
    /// current session.
    fn record_for(&self, session: &AgentSession, message: AgentMessage) -> bool {
        let role = session.role();
        self.bus.publish_returning(|| {
            let mut roles = self.lock_roles();
            let Some(state) = roles.get_mut(&role) else {
                return (None, false);
            };
            let current = state
                .session
                .as_deref()
                .is_some_and(|current| std::ptr::eq(current, session));
            if !current {
                return (None, false);
            }
            state.history.push(message.clone());
            (Some(MessageEvent { role, message }), true)
        })
    }

    fn record(&self, role: AgentRole, message: AgentMessage) {
        self.bus.publish_with(|| {
            self.lock_roles()
                .entry(role)
                .or_default()
                .history
                .push(message.clone());
            MessageEvent { role, message }
        });
    }

    fn record_usage(
        &self,
        role: AgentRole,
        model: &str,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    ) {
        if input_tokens.is_none() && output_tokens.is_none() {
            return;
        }
        let input = input_tokens.unwrap_or(0);
        let output = output_tokens.unwrap_or(0);
        if let Some(usage) = &self.usage {
            usage.record(&role.to_string(), model, input, output);
        }
        self.observer
            .record_metric(&ObserverMetric::TokensUsed(input.saturating_add(output)));
    }

    fn lock_roles(&self) -> MutexGuard<'_, HashMap<AgentRole, RoleState>> {
        self.roles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
