use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsuranceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl InsuranceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<config::ConfigError> for InsuranceError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<InsuranceError> for error_common::EngineError {
    fn from(err: InsuranceError) -> Self {
        use error_common::EngineError;

        match err {
            InsuranceError::Config(msg) => EngineError::ConfigError(msg),
            InsuranceError::Database(e) => EngineError::DatabaseError(e.to_string()),
            InsuranceError::Migration(e) => EngineError::DatabaseError(e.to_string()),
            InsuranceError::Internal(e) => EngineError::Other(e),
            other => EngineError::VerificationError(other.to_string()),
        }
    }
}

pub type InsuranceResult<T> = Result<T, InsuranceError>;
