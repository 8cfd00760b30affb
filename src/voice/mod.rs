//! Voice processing module
//!
//! Handles microphone capture, speech endpointing, transcription,
//! synthesis and playback.

mod capture;
mod detector;
mod output;
mod playback;
mod stt;
mod tts;

pub use capture::{
    AudioCapture, CaptureFailure, Listener, SAMPLE_RATE, Utterance, sample_microphone,
    samples_to_wav,
};
pub use detector::{DetectorState, SpeechDetector, rms, samples_for};
pub use output::{
    DEFAULT_RATE, DEFAULT_VOLUME, MAX_RATE, MAX_VOLUME, MIN_RATE, MIN_VOLUME, VoiceOutput,
    VoiceParameter, VoiceProfile,
};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{EspeakSynthesizer, OpenAiSynthesizer, Synthesizer, VoiceInfo, parse_espeak_voices};
