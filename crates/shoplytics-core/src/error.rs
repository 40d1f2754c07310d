use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event type entry '{0}': expected name=code")]
    InvalidEventTypeEntry(String),

    #[error("event type code {code} is assigned to both '{first}' and '{second}'")]
    DuplicateEventTypeCode {
        code: i32,
        first: String,
        second: String,
    },
}
