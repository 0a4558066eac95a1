pub mod message;
pub mod registry;
pub mod roles;
pub mod session;
pub mod structured;

pub use message::{AgentMessage, MessageEvent, MessageRole, PromptMetadata};
pub use registry::AgentSessionRegistry;
pub use roles::AgentRole;
pub use session::AgentSession;
pub use structured::try_parse_structured;
