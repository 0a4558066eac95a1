use crate::agents::AgentRole;
use crate::error::ConfigError;
use crate::usage::{ModelPricing, default_pricing};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub usage: UsageConfig,
}

fn default_model() -> String {
    "echo-1".into()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".storyforge").join("config.toml"),
            default_model: default_model(),
            default_temperature: default_temperature(),
            backend: BackendConfig::default(),
            review: ReviewConfig::default(),
            agents: AgentsConfig::default(),
            observability: ObservabilityConfig::default(),
            usage: UsageConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::Validation(format!(
                "default_temperature must be within 0.0..=2.0, got {}",
                self.default_temperature
            )));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_model must not be empty".into(),
            ));
        }
        self.agents.validate()
    }

    /// Model a role should use: its override, else the default.
    pub fn model_for(&self, role: AgentRole) -> &str {
        self.agents
            .role(role)
            .and_then(|o| o.model.as_deref())
            .unwrap_or(&self.default_model)
    }
}

// ── Backend ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Echo,
    Compatible,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`)
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

// ── Review gate ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Review mode at startup
    #[serde(default)]
    pub enabled: bool,
    /// Only the queue head may be resolved or rejected
    #[serde(default = "default_true")]
    pub head_only: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            head_only: true,
        }
    }
}

// ── Agents ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOverride {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_max_concurrent_scenes")]
    pub max_concurrent_scenes: usize,
    /// Keyed by role name (`director`, `screenwriter`, ...)
    #[serde(default)]
    pub roles: BTreeMap<String, RoleOverride>,
}

fn default_max_concurrent_scenes() -> usize {
    4
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scenes: default_max_concurrent_scenes(),
            roles: BTreeMap::new(),
        }
    }
}

impl AgentsConfig {
    pub fn role(&self, role: AgentRole) -> Option<&RoleOverride> {
        self.roles.get(&role.to_string())
    }

    /// Priming instruction for a role: its override, else the built-in one.
    pub fn instruction_for(&self, role: AgentRole) -> String {
        self.role(role)
            .and_then(|o| o.system_instruction.clone())
            .unwrap_or_else(|| role.default_instruction().to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_scenes == 0 {
            return Err(ConfigError::Validation(
                "agents.max_concurrent_scenes must be at least 1".into(),
            ));
        }
        if let Some(unknown) = self
            .roles
            .keys()
            .find(|name| AgentRole::from_str(name).is_err())
        {
            return Err(ConfigError::Validation(format!(
                "agents.roles.{unknown} is not a known role"
            )));
        }
        Ok(())
    }
}

// ── Observability ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "none".into(),
        }
    }
}

// ── Usage ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    #[serde(default = "default_pricing")]
    pub pricing: Vec<ModelPricing>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            pricing: default_pricing(),
        }
    }
}
