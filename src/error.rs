use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `StoryForge`.
///
/// Each subsystem defines its own error variant. Pipeline stages match on
/// these to decide whether a failure is a human veto or a backend problem;
/// internal code continues to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ForgeError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Review gate ─────────────────────────────────────────────────────
    #[error("review: {0}")]
    Review(#[from] ReviewError),

    // ── Agent sessions ──────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Generation backend ──────────────────────────────────────────────
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    /// `true` when the failure is a reviewer rejecting the payload.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Review(err) => err.is_cancellation(),
            Self::Other(err) => is_cancellation(err),
            _ => false,
        }
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Review errors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// The reviewer rejected the request. Callers must not retry.
    #[error("request {id} ({title}) cancelled by reviewer")]
    Cancelled { id: String, title: String },
}

impl ReviewError {
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Checks an `anyhow` chain for a reviewer cancellation.
#[must_use]
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ReviewError>()
            .is_some_and(ReviewError::is_cancellation)
    })
}

// ─── Session errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session belongs to {actual}, not {expected}")]
    RoleMismatch { expected: String, actual: String },

    #[error("session for {role} was reset; call get_agent again")]
    Stale { role: String },
}

// ─── Backend errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend {backend} request failed: {message}")]
    Request { backend: String, message: String },

    #[error("backend {backend} authentication failed")]
    Auth { backend: String },

    #[error("backend {backend} API key not set (set STORYFORGE_API_KEY or [backend].api_key)")]
    MissingApiKey { backend: String },

    #[error("backend {backend} returned no content")]
    EmptyReply { backend: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ForgeError>;
