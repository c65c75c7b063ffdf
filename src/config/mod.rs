//! Configuration management for Parley
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use std::time::Duration;

use self::file::ParleyConfigFile;
use crate::{Error, Result};

/// Default upstream model
pub const DEFAULT_MODEL: &str = "llama2";

/// Default recognition and synthesis language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default relay server port
pub const DEFAULT_PORT: u16 = 3000;

/// Opening line of a new conversation
pub const DEFAULT_GREETING: &str =
    "Hello! I am your AI English partner. Start speaking whenever you are ready.";

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream model endpoint
    pub upstream: UpstreamConfig,

    /// Relay server configuration
    pub server: ServerConfig,

    /// Voice conversation client configuration
    pub client: ClientConfig,

    /// Speech provider configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Upstream chat-completion endpoint configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Endpoint URL (required to serve)
    pub url: Option<String>,

    /// Model identifier sent with every request
    pub model: String,

    /// Bound on a single upstream call
    pub timeout: Duration,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

/// Voice conversation client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay `/chat` URL
    pub relay_url: String,

    /// Bound on a single relay round trip
    pub timeout: Duration,

    /// Recognition and synthesis language tag
    pub language: String,

    /// Consecutive failed recognizer restarts before capture halts
    pub max_restart_attempts: u32,

    /// Ignore microphone audio while a reply is playing
    pub mute_during_playback: bool,

    /// Opening line shown when the conversation starts
    pub greeting: String,
}

/// Speech-to-text provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

/// Text-to-speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAi,
    ElevenLabs,
    /// Replies are printed, not spoken
    None,
}

/// Speech provider configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("deepgram", &mask(&self.deepgram))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .finish()
    }
}

impl SttProvider {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Some(Self::Whisper),
            "deepgram" => Some(Self::Deepgram),
            _ => None,
        }
    }

    const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl TtsProvider {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "elevenlabs" => Some(Self::ElevenLabs),
            "none" | "off" => Some(Self::None),
            _ => None,
        }
    }

    const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi | Self::None => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }
}

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the environment and the standard config file
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    pub fn from_sources(fc: ParleyConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let upstream = UpstreamConfig {
            url: env("PARLEY_UPSTREAM_URL").or(fc.upstream.url),
            model: env("PARLEY_MODEL")
                .or(fc.upstream.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(
                env("PARLEY_UPSTREAM_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .or(fc.upstream.timeout_secs)
                    .unwrap_or(60),
            ),
        };

        let port = env("PARLEY_PORT")
            .or_else(|| env("PORT"))
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);
        let server = ServerConfig { port };

        let client = ClientConfig {
            relay_url: env("PARLEY_RELAY_URL")
                .or(fc.client.relay_url)
                .unwrap_or_else(|| format!("http://localhost:{DEFAULT_PORT}/chat")),
            timeout: Duration::from_secs(
                env("PARLEY_RELAY_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .or(fc.client.timeout_secs)
                    .unwrap_or(120),
            ),
            language: env("PARLEY_LANGUAGE")
                .or(fc.client.language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            max_restart_attempts: fc.client.max_restart_attempts.unwrap_or(5),
            mute_during_playback: env("PARLEY_MUTE_DURING_PLAYBACK")
                .map(|v| parse_bool(&v))
                .or(fc.client.mute_during_playback)
                .unwrap_or(true),
            greeting: fc
                .client
                .greeting
                .unwrap_or_else(|| DEFAULT_GREETING.to_string()),
        };

        let stt_provider = env("PARLEY_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .and_then(|s| SttProvider::parse(&s))
            .unwrap_or(SttProvider::Whisper);
        let tts_provider = env("PARLEY_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .and_then(|s| TtsProvider::parse(&s))
            .unwrap_or(TtsProvider::OpenAi);
        let voice = VoiceConfig {
            stt_provider,
            stt_model: env("PARLEY_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            tts_provider,
            tts_model: env("PARLEY_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        Self {
            upstream,
            server,
            client,
            voice,
            api_keys,
        }
    }

    /// Upstream endpoint URL, required by the relay server
    ///
    /// # Errors
    ///
    /// Returns error if no upstream URL is configured
    pub fn upstream_url(&self) -> Result<&str> {
        self.upstream
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "upstream URL required (set PARLEY_UPSTREAM_URL or [upstream] url)"
                        .to_string(),
                )
            })
    }
}
