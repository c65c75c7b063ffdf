//! Speech capture session
//!
//! Owns one recognition engine for the length of a conversation and
//! normalizes its output into discrete, deduplicated utterances. Engine
//! noise (spurious ends, transient errors) is absorbed here by restarting.

use super::engine::{EngineEvent, RecognitionConfig, RecognitionEngine, RecognitionResult};

/// A finalized utterance accepted by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub text: String,
    /// Position in this session's stream of accepted utterances
    pub index: u64,
}

/// What the session reports upward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// A new finalized utterance
    Utterance(RecognitionEvent),
    /// The engine could not be restarted and capture has stopped
    Halted,
}

/// Continuous capture session over a recognition engine
pub struct CaptureSession<E> {
    engine: E,
    config: RecognitionConfig,
    /// Whether capture is meant to be running, regardless of engine state
    listening: bool,
    last_utterance: Option<String>,
    failed_restarts: u32,
    next_index: u64,
}

impl<E: RecognitionEngine> CaptureSession<E> {
    /// Wrap an engine; nothing is started yet
    pub fn new(engine: E, config: RecognitionConfig) -> Self {
        tracing::debug!(
            language = %config.language,
            continuous = config.continuous,
            interim_results = config.interim_results,
            "capture session created"
        );

        Self {
            engine,
            config,
            listening: false,
            last_utterance: None,
            failed_restarts: 0,
            next_index: 0,
        }
    }

    /// Begin capturing; a failing engine start is ignored
    pub fn start(&mut self) {
        self.listening = true;
        self.failed_restarts = 0;

        if let Err(e) = self.engine.start() {
            tracing::debug!(error = %e, "recognizer start ignored");
        }
    }

    /// Stop capturing and disable automatic restarts
    pub fn stop(&mut self) {
        self.listening = false;

        if let Err(e) = self.engine.stop() {
            tracing::debug!(error = %e, "recognizer stop ignored");
        }
    }

    /// Forget the last accepted utterance
    pub fn reset_dedup(&mut self) {
        self.last_utterance = None;
    }

    /// Whether capture is meant to be running
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    #[must_use]
    pub const fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Access the wrapped engine
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Apply one engine event
    pub fn handle(&mut self, event: EngineEvent) -> Option<SessionSignal> {
        match event {
            EngineEvent::Results {
                result_index,
                results,
            } => {
                self.failed_restarts = 0;
                self.accept(&finalized_text(result_index, &results))
            }
            EngineEvent::End => {
                if !self.listening {
                    return None;
                }
                tracing::debug!("recognizer ended while listening, restarting");
                self.restart(false)
            }
            EngineEvent::Error(reason) => {
                if !self.listening {
                    return None;
                }
                tracing::debug!(reason = %reason, "recognizer error, recovering");
                self.restart(true)
            }
        }
    }

    /// Wait for the next signal; `None` once the engine is gone
    pub async fn next_signal(&mut self) -> Option<SessionSignal> {
        loop {
            let event = self.engine.next_event().await?;
            if let Some(signal) = self.handle(event) {
                return Some(signal);
            }
        }
    }

    fn accept(&mut self, text: &str) -> Option<SessionSignal> {
        let text = text.trim();
        if text.is_empty() || self.last_utterance.as_deref() == Some(text) {
            return None;
        }

        self.last_utterance = Some(text.to_string());
        let index = self.next_index;
        self.next_index += 1;

        tracing::debug!(index, text, "utterance recognized");
        Some(SessionSignal::Utterance(RecognitionEvent {
            text: text.to_string(),
            index,
        }))
    }

    fn restart(&mut self, stop_first: bool) -> Option<SessionSignal> {
        if stop_first {
            if let Err(e) = self.engine.stop() {
                tracing::debug!(error = %e, "recognizer stop before restart ignored");
            }
        }

        match self.engine.start() {
            Ok(()) => {
                self.failed_restarts = 0;
                None
            }
            Err(e) => {
                self.failed_restarts += 1;
                tracing::debug!(
                    error = %e,
                    attempt = self.failed_restarts,
                    "recognizer restart failed"
                );

                if self.failed_restarts < self.config.max_restart_attempts {
                    return None;
                }

                tracing::warn!(
                    attempts = self.failed_restarts,
                    "recognizer keeps failing to restart, halting capture"
                );
                self.listening = false;
                Some(SessionSignal::Halted)
            }
        }
    }
}

/// Join the final results of a batch, starting at `result_index`
fn finalized_text(result_index: usize, results: &[RecognitionResult]) -> String {
    results
        .iter()
        .skip(result_index)
        .filter(|r| r.is_final)
        .map(|r| r.transcript.as_str())
        .collect()
}
