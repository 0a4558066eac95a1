pub mod compatible;
pub mod echo;
pub mod factory;
pub mod scrub;
pub mod traits;

pub use compatible::CompatibleBackend;
pub use echo::EchoBackend;
pub use factory::create_backend;
pub use scrub::{sanitize_api_error, scrub_secret_patterns};
pub use traits::{BackendFuture, BackendReply, ChatBackend, ChatTurn, TurnSpeaker};
