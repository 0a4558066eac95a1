mod env_overrides;
mod loader;
pub mod schema;

pub use schema::{
    AgentsConfig, BackendConfig, BackendKind, Config, ObservabilityConfig, ReviewConfig,
    RoleOverride, UsageConfig,
};
