//! Fire-and-forget speech output
//!
//! `speak` returns immediately; synthesis and playback run on background
//! tasks so the conversation loop can keep listening.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;

/// Something that can say a reply out loud
///
/// Turn errors go to stderr by default and stay the current error until
/// `clear_error` is called.
pub trait Playback: Send + Sync {
    /// Start speaking `text` without waiting for it to finish
    fn speak(&self, text: &str);

    /// Show a turn failure to the user
    fn show_error(&self, message: &str) {
        print_status(&format!("error> {message}"));
    }

    /// The last shown error no longer applies
    fn clear_error(&self) {
        print_status("error> cleared");
    }
}

fn print_status(line: &str) {
    let mut stderr = std::io::stderr().lock();
    if let Err(e) = writeln!(stderr, "{line}") {
        tracing::warn!(error = %e, "failed to print status");
    }
}

/// Shared flag raised while any reply is being played
///
/// The microphone recognizer checks it to avoid transcribing the
/// partner's own voice.
#[derive(Debug, Clone, Default)]
pub struct PlaybackGate {
    active: Arc<AtomicUsize>,
}

impl PlaybackGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one reply is playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Mark playback as active until the guard is dropped
    #[must_use]
    pub fn hold(&self) -> SpeakingGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        SpeakingGuard {
            active: Arc::clone(&self.active),
        }
    }
}

/// Keeps a `PlaybackGate` raised while alive
#[derive(Debug)]
pub struct SpeakingGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Speaks replies through TTS and the default output device
pub struct Speaker {
    tts: Arc<TextToSpeech>,
    gate: PlaybackGate,
}

impl Speaker {
    #[must_use]
    pub fn new(tts: TextToSpeech, gate: PlaybackGate) -> Self {
        Self {
            tts: Arc::new(tts),
            gate,
        }
    }
}

impl Playback for Speaker {
    fn speak(&self, text: &str) {
        let tts = Arc::clone(&self.tts);
        let guard = self.gate.hold();
        let text = text.to_string();

        tokio::spawn(async move {
            let _guard = guard;

            let audio = match tts.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed");
                    return;
                }
            };

            // cpal streams stay on the thread that built them
            let played = tokio::task::spawn_blocking(move || {
                AudioPlayback::new()?.play_mp3_blocking(&audio)
            })
            .await;

            match played {
                Ok(Ok(())) => tracing::debug!(chars = text.len(), "reply spoken"),
                Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
                Err(e) => tracing::warn!(error = %e, "playback task panicked"),
            }
        });
    }
}

/// Prints replies to stdout instead of speaking them
#[derive(Debug, Default)]
pub struct ConsoleSpeaker;

impl Playback for ConsoleSpeaker {
    fn speak(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "partner> {text}") {
            tracing::warn!(error = %e, "failed to print reply");
        }
    }
}
