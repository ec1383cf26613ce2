use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Observer channel closed")]
    ObserverClosed,

    #[error("Observer is not keeping up with the event stream")]
    ObserverLagging,

    #[error("Observer delivery timed out after {0:?}")]
    DeliveryTimeout(std::time::Duration),

    #[error("Observer delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Event serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EventBusError>;
