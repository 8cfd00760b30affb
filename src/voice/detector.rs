//! Energy-based speech endpointing
//!
//! Decides when a phrase starts and ends in a stream of microphone samples.
//! A phrase starts when a chunk rises above the energy threshold and ends
//! after enough trailing silence, provided enough speech was heard.

use std::time::Duration;

/// State of the speech detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech started, accumulating the phrase
    Speaking,
    /// Phrase ended; waiting for [`SpeechDetector::take_phrase`]
    Complete,
}

/// Segments microphone audio into phrases
#[derive(Debug)]
pub struct SpeechDetector {
    threshold: f32,
    min_speech_samples: usize,
    pause_samples: usize,
    state: DetectorState,
    phrase: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
}

impl SpeechDetector {
    /// Create a detector with thresholds expressed in samples
    ///
    /// # Arguments
    ///
    /// * `threshold` - RMS energy above which a chunk counts as speech
    /// * `min_speech_samples` - speech required before a phrase may end
    /// * `pause_samples` - trailing silence that ends a phrase
    #[must_use]
    pub const fn new(threshold: f32, min_speech_samples: usize, pause_samples: usize) -> Self {
        Self {
            threshold,
            min_speech_samples,
            pause_samples,
            state: DetectorState::Idle,
            phrase: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    /// Create a detector with thresholds expressed as durations
    #[must_use]
    pub fn with_durations(
        threshold: f32,
        phrase_threshold: Duration,
        pause_threshold: Duration,
        sample_rate: u32,
    ) -> Self {
        Self::new(
            threshold,
            samples_for(phrase_threshold, sample_rate),
            samples_for(pause_threshold, sample_rate),
        )
    }

    /// Feed a chunk of samples
    ///
    /// Returns true once the current phrase is complete
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = rms(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.phrase.clear();
                    self.phrase.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            DetectorState::Speaking => {
                self.phrase.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                if self.silence_samples >= self.pause_samples {
                    if self.speech_samples >= self.min_speech_samples {
                        tracing::debug!(samples = self.phrase.len(), "phrase complete");
                        self.state = DetectorState::Complete;
                    } else {
                        tracing::trace!("speech too short, discarding");
                        self.reset();
                    }
                }
            }
            DetectorState::Complete => {}
        }

        self.state == DetectorState::Complete
    }

    /// Take the phrase audio and return to idle
    pub fn take_phrase(&mut self) -> Vec<f32> {
        let phrase = std::mem::take(&mut self.phrase);
        self.reset();
        phrase
    }

    /// Samples accumulated for the current phrase
    #[must_use]
    pub fn phrase_len(&self) -> usize {
        self.phrase.len()
    }

    /// Reset to idle, dropping any partial phrase
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.phrase.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Energy threshold in use
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Number of samples covering `duration` at `sample_rate`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_millis() * u128::from(sample_rate) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms(&loud) > 0.4);

        assert!(rms(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_samples_for() {
        assert_eq!(samples_for(Duration::from_millis(300), 16_000), 4800);
        assert_eq!(samples_for(Duration::from_secs(2), 16_000), 32_000);
    }

    #[test]
    fn test_short_blip_is_discarded() {
        let mut detector = SpeechDetector::new(0.03, 1000, 500);

        assert!(!detector.process(&[0.5; 100]));
        assert_eq!(detector.state(), DetectorState::Speaking);

        assert!(!detector.process(&[0.0; 600]));
        assert_eq!(detector.state(), DetectorState::Idle);
        assert_eq!(detector.phrase_len(), 0);
    }
}
