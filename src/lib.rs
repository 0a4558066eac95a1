#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod agents;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod review;
pub mod usage;

pub use agents::{AgentMessage, AgentRole, AgentSession, AgentSessionRegistry, MessageRole};
pub use config::Config;
pub use error::{ForgeError, ReviewError, SessionError};
pub use events::{EventBus, Subscription};
pub use review::{PendingRequestData, ReviewGate, ReviewOutcome};
