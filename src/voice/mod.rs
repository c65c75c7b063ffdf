//! Voice processing module
//!
//! Speech capture (engines and the capture session) and speech output.

mod capture;
pub mod engine;
mod playback;
mod recognizer;
mod segmenter;
pub mod session;
mod speaker;
mod stt;
mod text;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use engine::{EngineEvent, RecognitionConfig, RecognitionEngine, RecognitionResult};
pub use playback::{AudioPlayback, decode_mp3};
pub use recognizer::MicrophoneRecognizer;
pub use segmenter::{SegmenterState, SpeechSegmenter, calculate_energy};
pub use session::{CaptureSession, RecognitionEvent, SessionSignal};
pub use speaker::{ConsoleSpeaker, Playback, PlaybackGate, Speaker, SpeakingGuard};
pub use stt::SpeechToText;
pub use text::LineRecognizer;
pub use tts::TextToSpeech;
