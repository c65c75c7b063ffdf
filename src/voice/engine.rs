//! Continuous speech recognition engine boundary
//!
//! An engine turns live speech into batches of recognition results and
//! reports when its session ends or fails. Engines are free to end
//! spuriously; `CaptureSession` decides whether to restart them.

use async_trait::async_trait;

use crate::config::DEFAULT_LANGUAGE;
use crate::Result;

/// How the recognition engine should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Language tag (e.g. "en-US")
    pub language: String,
    /// Keep recognizing across pauses
    pub continuous: bool,
    /// Surface non-final hypotheses
    pub interim_results: bool,
    /// Consecutive failed restarts before the session gives up
    pub max_restart_attempts: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            continuous: true,
            interim_results: false,
            max_restart_attempts: 5,
        }
    }
}

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    #[must_use]
    pub fn finished(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }

    #[must_use]
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }
}

/// Something the engine reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// New results; entries before `result_index` were already delivered
    Results {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// The recognition session ended
    End,
    /// The recognition session failed
    Error(String),
}

/// A continuous speech recognizer
///
/// Not `Send`: audio streams are tied to the thread that opened them.
#[async_trait(?Send)]
pub trait RecognitionEngine {
    /// Begin (or resume) recognition
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot start, including when it is
    /// already running
    fn start(&mut self) -> Result<()>;

    /// Stop recognition
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot be stopped cleanly
    fn stop(&mut self) -> Result<()>;

    /// Wait for the next event; `None` once the engine is gone for good
    async fn next_event(&mut self) -> Option<EngineEvent>;
}
