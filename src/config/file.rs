//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// Upstream model endpoint
    #[serde(default)]
    pub upstream: UpstreamFileConfig,

    /// Relay server
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Voice conversation client
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Speech recognition and synthesis providers
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Upstream chat-completion endpoint
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamFileConfig {
    /// Endpoint URL (e.g. "http://localhost:11434/v1/chat/completions")
    pub url: Option<String>,

    /// Model identifier (e.g. "llama2")
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,
}

/// Voice conversation client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Relay `/chat` URL
    pub relay_url: Option<String>,

    /// Relay request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Recognition and synthesis language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Consecutive failed recognizer restarts before giving up
    pub max_restart_attempts: Option<u32>,

    /// Ignore the microphone while a reply is being spoken
    pub mute_during_playback: Option<bool>,

    /// Opening line shown when the conversation starts
    pub greeting: Option<String>,
}

/// Speech provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// "whisper" or "deepgram"
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// "openai", "elevenlabs" or "none"
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Parse a config file from TOML text
///
/// # Errors
///
/// Returns error if the text is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<ParleyConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    config_file_path().map_or_else(ParleyConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ParleyConfigFile {
    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let fc = parse_config_file(
            r#"
            [upstream]
            url = "http://localhost:11434/v1/chat/completions"

            [client]
            language = "en-GB"
            "#,
        )
        .unwrap();

        assert_eq!(
            fc.upstream.url.as_deref(),
            Some("http://localhost:11434/v1/chat/completions")
        );
        assert!(fc.upstream.model.is_none());
        assert_eq!(fc.client.language.as_deref(), Some("en-GB"));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn test_invalid_file_is_error() {
        assert!(parse_config_file("[server]\nport = \"not a port\"").is_err());
    }

    #[test]
    fn test_missing_path_gives_defaults() {
        let fc = load_config_file_from(Path::new("/nonexistent/parley/config.toml"));
        assert!(fc.upstream.url.is_none());
    }
}
