//! Error types for Parley

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable speech recognition capability in this environment
    #[error("speech recognition unavailable: {0}")]
    RecognitionUnavailable(String),

    /// Recognition engine failed to start or stop
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Backend relay round trip failed
    #[error("relay error: {0}")]
    Relay(String),

    /// Upstream model endpoint rejected the request or could not be reached
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream model answered without a usable reply
    #[error("upstream returned an empty response")]
    EmptyResponse,

    /// A control was used while a turn is awaiting its reply
    #[error("a reply is still pending")]
    TurnInFlight,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
