//! Energy-based speech segmentation
//!
//! Splits a continuous microphone stream into utterance-sized segments:
//! speech followed by a pause closes a segment.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to keep a segment (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Silence duration that ends an utterance (0.8 seconds)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize * 8 / 10;

/// Longest segment before it is force-closed (30 seconds)
const MAX_SEGMENT_SAMPLES: usize = SAMPLE_RATE as usize * 30;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Accumulating an utterance
    Speaking,
    /// Utterance closed, waiting for `take_segment`
    Complete,
}

/// Detects utterance boundaries in audio
#[derive(Debug)]
pub struct SpeechSegmenter {
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmenterState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed audio samples
    ///
    /// Returns true once an utterance is complete and ready to be taken
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let speech_len = self.speech_buffer.len().saturating_sub(self.silence_counter);

                if self.silence_counter > SILENCE_SAMPLES {
                    if speech_len > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = SegmenterState::Complete;
                    } else {
                        tracing::trace!("too short - resetting");
                        self.reset();
                    }
                } else if self.speech_buffer.len() > MAX_SEGMENT_SAMPLES {
                    tracing::debug!("utterance too long - closing segment");
                    self.state = SegmenterState::Complete;
                }
            }
            SegmenterState::Complete => {}
        }

        self.state == SegmenterState::Complete
    }

    /// Take the completed utterance and return to idle
    pub fn take_segment(&mut self) -> Vec<f32> {
        self.state = SegmenterState::Idle;
        self.silence_counter = 0;
        std::mem::take(&mut self.speech_buffer)
    }

    /// Reset to idle, discarding partial speech
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// True while no speech is being accumulated
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == SegmenterState::Idle
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(samples: usize) -> Vec<f32> {
        vec![0.3; samples]
    }

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_short_blip_discarded() {
        let mut segmenter = SpeechSegmenter::new();

        assert!(!segmenter.process(&tone(800)));
        assert_eq!(segmenter.state(), SegmenterState::Speaking);

        assert!(!segmenter.process(&vec![0.0; SILENCE_SAMPLES + 1]));
        assert!(segmenter.is_idle());
    }

    #[test]
    fn test_too_long_segment_closed() {
        let mut segmenter = SpeechSegmenter::new();
        segmenter.process(&tone(1600));
        assert!(segmenter.process(&tone(MAX_SEGMENT_SAMPLES)));
        assert!(segmenter.take_segment().len() > MAX_SEGMENT_SAMPLES);
    }
}
