//! Turn coordination
//!
//! The coordinator is the single owner of the transcript and of whose
//! turn it is. Only one relay call may be outstanding: utterances that
//! arrive while a reply is pending are dropped, not queued.

use std::sync::Arc;

use crate::conversation::{Message, Transcript};
use crate::voice::Playback;
use crate::{Error, Result};

const HALTED_MESSAGE: &str = "speech recognition stopped responding; start again to resume";

/// Where the conversation loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Capture is off
    Idle,
    /// Waiting for the user to say something
    Listening,
    /// A user turn is with the relay; new utterances are ignored
    AwaitingReply,
}

/// Owns the transcript and enforces strict turn order
pub struct TurnCoordinator {
    state: SessionState,
    transcript: Transcript,
    last_error: Option<String>,
    capture_halted: bool,
    playback: Arc<dyn Playback>,
}

impl TurnCoordinator {
    #[must_use]
    pub fn new(playback: Arc<dyn Playback>) -> Self {
        Self {
            state: SessionState::Idle,
            transcript: Transcript::new(),
            last_error: None,
            capture_halted: false,
            playback,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Error shown to the user until the next successful turn
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Open the floor to the user
    pub fn start(&mut self) {
        if self.last_error.take().is_some() {
            self.playback.clear_error();
        }
        self.capture_halted = false;

        if self.state == SessionState::Idle {
            self.state = SessionState::Listening;
        }
    }

    /// Turn capture off
    ///
    /// # Errors
    ///
    /// Returns `Error::TurnInFlight` while a reply is pending
    pub fn stop(&mut self) -> Result<()> {
        if self.state == SessionState::AwaitingReply {
            return Err(Error::TurnInFlight);
        }

        self.state = SessionState::Idle;
        Ok(())
    }

    /// Take a user turn
    ///
    /// Returns the history to send, or `None` if the utterance was dropped
    /// because it is not the user's turn.
    pub fn begin_turn(&mut self, text: &str) -> Option<Vec<Message>> {
        if self.state != SessionState::Listening {
            tracing::debug!(state = ?self.state, text, "utterance dropped");
            return None;
        }

        self.state = SessionState::AwaitingReply;
        self.transcript.push(Message::user(text));

        tracing::info!(turn = self.transcript.len(), text, "user turn");
        Some(self.transcript.snapshot())
    }

    /// Finish the pending turn with the relay's outcome
    pub fn complete_turn(&mut self, outcome: Result<String>) {
        if self.state != SessionState::AwaitingReply {
            tracing::warn!(state = ?self.state, "reply arrived with no turn pending");
            return;
        }

        match outcome {
            Ok(reply) => {
                tracing::info!(reply = %reply, "partner turn");
                self.transcript.push(Message::bot(reply.clone()));
                self.playback.speak(&reply);

                // A halted capture keeps its error until the user starts again
                if !self.capture_halted && self.last_error.take().is_some() {
                    self.playback.clear_error();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "turn failed");
                self.record_error(e.to_string());
            }
        }

        self.state = if self.capture_halted {
            SessionState::Idle
        } else {
            SessionState::Listening
        };
    }

    /// Capture gave up for good; the user has to start again
    pub fn capture_halted(&mut self) {
        self.capture_halted = true;
        self.record_error(HALTED_MESSAGE.to_string());

        if self.state == SessionState::Listening {
            self.state = SessionState::Idle;
        }
    }

    fn record_error(&mut self, message: String) {
        self.playback.show_error(&message);
        self.last_error = Some(message);
    }
}
