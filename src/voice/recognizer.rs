//! Microphone-backed continuous recognizer
//!
//! Polls the capture buffer, cuts speech into utterances with the
//! segmenter, and transcribes each one through the STT provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::engine::{EngineEvent, RecognitionEngine, RecognitionResult};
use super::segmenter::SpeechSegmenter;
use super::speaker::PlaybackGate;
use super::stt::SpeechToText;
use crate::{Error, Result};

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A recognition session ends after this long without speech
const IDLE_SESSION_LIMIT: Duration = Duration::from_secs(60);

/// Turns a finished WAV segment into text
#[async_trait(?Send)]
trait Transcriber {
    async fn transcribe(&self, wav: &[u8]) -> Result<String>;
}

#[async_trait(?Send)]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        Self::transcribe(self, wav).await
    }
}

/// Utterance audio waiting on transcription
///
/// The audio is only released once the STT call returns, so a
/// `next_event` future dropped mid-call retries the same utterance on the
/// next poll instead of losing it.
#[derive(Debug, Default)]
struct PendingUtterance {
    wav: Option<Vec<u8>>,
}

impl PendingUtterance {
    fn queue(&mut self, wav: Vec<u8>) {
        self.wav = Some(wav);
    }

    fn clear(&mut self) {
        self.wav = None;
    }

    /// Transcribe the queued utterance, if any
    async fn resolve<T: Transcriber + ?Sized>(&mut self, stt: &T) -> Option<EngineEvent> {
        let wav = self.wav.as_deref()?;
        let transcript = stt.transcribe(wav).await;
        self.wav = None;

        Some(match transcript {
            Ok(text) => EngineEvent::Results {
                result_index: 0,
                results: vec![RecognitionResult::finished(text)],
            },
            Err(e) => EngineEvent::Error(e.to_string()),
        })
    }
}

/// Continuous recognizer over the default input device
pub struct MicrophoneRecognizer {
    capture: AudioCapture,
    segmenter: SpeechSegmenter,
    stt: SpeechToText,
    pending: PendingUtterance,
    /// Set when captured audio should be ignored during playback
    mute_gate: Option<PlaybackGate>,
    last_speech: Instant,
}

impl MicrophoneRecognizer {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns `Error::RecognitionUnavailable` if there is no usable
    /// microphone
    pub fn new(stt: SpeechToText, mute_gate: Option<PlaybackGate>) -> Result<Self> {
        let capture =
            AudioCapture::new().map_err(|e| Error::RecognitionUnavailable(e.to_string()))?;

        Ok(Self {
            capture,
            segmenter: SpeechSegmenter::new(),
            stt,
            pending: PendingUtterance::default(),
            mute_gate,
            last_speech: Instant::now(),
        })
    }

    fn muted(&self) -> bool {
        self.mute_gate.as_ref().is_some_and(PlaybackGate::is_speaking)
    }
}

#[async_trait(?Send)]
impl RecognitionEngine for MicrophoneRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.capture.is_capturing() {
            return Err(Error::Recognition("recognizer already started".to_string()));
        }

        self.capture.start()?;
        self.segmenter.reset();
        self.last_speech = Instant::now();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.capture.stop();
        self.segmenter.reset();
        self.pending.clear();
        Ok(())
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        loop {
            if let Some(event) = self.pending.resolve(&self.stt).await {
                return Some(event);
            }

            tokio::time::sleep(POLL_INTERVAL).await;

            if !self.capture.is_capturing() {
                continue;
            }

            if self.capture.has_failed() {
                self.capture.stop();
                return Some(EngineEvent::Error("audio stream failed".to_string()));
            }

            let samples = self.capture.take_buffer();

            if self.muted() {
                self.segmenter.reset();
                self.last_speech = Instant::now();
                continue;
            }

            if self.segmenter.process(&samples) {
                self.last_speech = Instant::now();
                match samples_to_wav(&self.segmenter.take_segment(), SAMPLE_RATE) {
                    Ok(wav) => self.pending.queue(wav),
                    Err(e) => return Some(EngineEvent::Error(e.to_string())),
                }
                continue;
            }

            if !self.segmenter.is_idle() {
                self.last_speech = Instant::now();
            } else if self.last_speech.elapsed() > IDLE_SESSION_LIMIT {
                tracing::debug!("no speech for a while, ending recognition session");
                self.capture.stop();
                return Some(EngineEvent::End);
            }
        }
    }
}
