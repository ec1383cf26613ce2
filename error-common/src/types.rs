use thiserror::Error;

/// Process-level error for the eligibility daemon
#[derive(Error, Debug)]
pub enum EngineError {
    /// Observer socket errors
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Listener bind / accept failures
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP server runtime errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Store connection or migration failures
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Verification engine errors surfaced to the process
    #[error("Verification error: {0}")]
    VerificationError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Short machine-readable category, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WebSocketError(_) => "websocket",
            Self::NetworkError(_) => "network",
            Self::ServerError(_) => "server",
            Self::DatabaseError(_) => "database",
            Self::VerificationError(_) => "verification",
            Self::ConfigError(_) => "config",
            Self::InternalError(_) | Self::Other(_) => "internal",
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Log an error that is being handled locally instead of propagated
pub fn log_error(context: &str, error: &EngineError) {
    tracing::error!(
        context = context,
        error_kind = error.kind(),
        error = %error,
        "eligibility engine error"
    );
}
