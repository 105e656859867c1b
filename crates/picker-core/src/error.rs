use thiserror::Error;

/// Errors produced by the picker protocol layer.
#[derive(Debug, Error)]
pub enum PickerError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("channel already in use: {0}")]
    ChannelInUse(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid url: {0}")]
    Url(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for PickerError {
    fn from(e: serde_json::Error) -> Self {
        PickerError::Codec(e.to_string())
    }
}

impl From<url::ParseError> for PickerError {
    fn from(e: url::ParseError) -> Self {
        PickerError::Url(e.to_string())
    }
}

pub type PickerResult<T> = Result<T, PickerError>;
