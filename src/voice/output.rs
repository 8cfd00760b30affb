//! Spoken output with adjustable voice parameters

use super::tts::{Synthesizer, VoiceInfo};
use crate::config::TtsConfig;
use crate::{Error, Result};

/// Slowest speaking rate in words per minute
pub const MIN_RATE: u32 = 100;
/// Fastest speaking rate in words per minute
pub const MAX_RATE: u32 = 300;
/// Quietest volume
pub const MIN_VOLUME: f32 = 0.1;
/// Loudest volume
pub const MAX_VOLUME: f32 = 1.0;
/// Rate used when nothing else is configured
pub const DEFAULT_RATE: u32 = 150;
/// Volume used when nothing else is configured
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Current voice settings
///
/// Rate and volume are clamped into range on every write, so a profile
/// can never hold an out-of-range value.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceProfile {
    rate: u32,
    volume: f32,
    active_voice_id: String,
}

impl VoiceProfile {
    /// Create a profile, clamping rate and volume into range
    #[must_use]
    pub fn new(rate: i64, volume: f32, voice_id: impl Into<String>) -> Self {
        Self {
            rate: clamp_rate(rate),
            volume: clamp_volume(volume, DEFAULT_VOLUME),
            active_voice_id: voice_id.into(),
        }
    }

    /// Speaking rate in words per minute
    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// Volume in [`MIN_VOLUME`], [`MAX_VOLUME`]
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Identifier of the voice in use
    #[must_use]
    pub fn active_voice_id(&self) -> &str {
        &self.active_voice_id
    }
}

fn clamp_rate(rate: i64) -> u32 {
    let clamped = rate.clamp(i64::from(MIN_RATE), i64::from(MAX_RATE));
    u32::try_from(clamped).unwrap_or(DEFAULT_RATE)
}

fn clamp_volume(volume: f32, fallback: f32) -> f32 {
    if volume.is_nan() {
        return fallback;
    }
    // Round to hundredths so repeated steps of 0.1 do not drift
    ((volume * 100.0).round() / 100.0).clamp(MIN_VOLUME, MAX_VOLUME)
}

/// A single voice parameter change
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceParameter {
    /// Absolute speaking rate, clamped into range
    Rate(i64),
    /// Absolute volume, clamped into range
    Volume(f32),
    /// Voice id or name; must name an available voice
    Voice(String),
}

/// Speaks text and owns the live voice profile
pub struct VoiceOutput {
    synthesizer: Box<dyn Synthesizer>,
    voices: Vec<VoiceInfo>,
    profile: VoiceProfile,
    defaults: VoiceProfile,
    shut_down: bool,
}

impl VoiceOutput {
    /// Create voice output over `synthesizer`
    ///
    /// The configured voice is used when it names an available voice;
    /// otherwise the synthesizer's default voice, or failing that the first
    /// available voice, is selected.
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer offers no voices
    pub fn new(synthesizer: Box<dyn Synthesizer>, config: &TtsConfig) -> Result<Self> {
        let voices = synthesizer.voices();
        let first = voices
            .first()
            .ok_or_else(|| Error::Voice("synthesizer offers no voices".to_string()))?;
        let fallback = synthesizer
            .default_voice()
            .and_then(|id| find_voice(&voices, &id))
            .unwrap_or(first);

        let voice_id = match config.voice.as_deref() {
            Some(wanted) => find_voice(&voices, wanted).map_or_else(
                || {
                    tracing::warn!(
                        voice = wanted,
                        fallback = %fallback.id,
                        "configured voice not available"
                    );
                    fallback.id.clone()
                },
                |v| v.id.clone(),
            ),
            None => fallback.id.clone(),
        };

        let profile = VoiceProfile::new(i64::from(config.rate), config.volume, voice_id);
        tracing::debug!(
            rate = profile.rate(),
            volume = profile.volume(),
            voice = profile.active_voice_id(),
            voices = voices.len(),
            "voice output ready"
        );

        Ok(Self {
            synthesizer,
            voices,
            defaults: profile.clone(),
            profile,
            shut_down: false,
        })
    }

    /// Current voice settings
    #[must_use]
    pub const fn profile(&self) -> &VoiceProfile {
        &self.profile
    }

    /// Voices available for selection
    #[must_use]
    pub fn voices(&self) -> &[VoiceInfo] {
        &self.voices
    }

    /// Speak `text`, logging and swallowing any failure
    pub async fn speak(&mut self, text: &str) {
        if let Err(e) = self.try_speak(text).await {
            tracing::warn!(error = %e, "failed to speak");
        }
    }

    /// Speak `text`, returning when playback has finished
    ///
    /// Blank text is skipped.
    ///
    /// # Errors
    ///
    /// Returns error if output has been shut down or synthesis or playback
    /// fails
    pub async fn try_speak(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.shut_down {
            return Err(Error::Voice("voice output is shut down".to_string()));
        }

        tracing::debug!(text, voice = self.profile.active_voice_id(), "speaking");
        self.synthesizer.speak(text, &self.profile).await
    }

    /// Apply one parameter change
    ///
    /// # Errors
    ///
    /// Returns [`Error::Voice`] for an unknown voice; the profile is left
    /// unchanged in that case
    pub fn set_parameter(&mut self, parameter: VoiceParameter) -> Result<()> {
        match parameter {
            VoiceParameter::Rate(rate) => self.profile.rate = clamp_rate(rate),
            VoiceParameter::Volume(volume) => {
                self.profile.volume = clamp_volume(volume, self.profile.volume);
            }
            VoiceParameter::Voice(wanted) => {
                let voice = find_voice(&self.voices, &wanted)
                    .ok_or_else(|| Error::Voice(format!("unknown voice: {wanted}")))?;
                self.profile.active_voice_id = voice.id.clone();
            }
        }

        tracing::debug!(profile = ?self.profile, "voice profile updated");
        Ok(())
    }

    /// Change the rate by `delta` words per minute
    pub fn adjust_rate(&mut self, delta: i64) {
        self.profile.rate = clamp_rate(i64::from(self.profile.rate) + delta);
    }

    /// Change the volume by `delta`
    pub fn adjust_volume(&mut self, delta: f32) {
        self.profile.volume = clamp_volume(self.profile.volume + delta, self.profile.volume);
    }

    /// Move `step` places through the voice list, wrapping at either end
    pub fn cycle_voice(&mut self, step: isize) {
        if self.voices.is_empty() {
            return;
        }

        let current = self
            .voices
            .iter()
            .position(|v| v.id == self.profile.active_voice_id)
            .unwrap_or(0);

        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let next = (current as isize + step).rem_euclid(self.voices.len() as isize) as usize;

        if let Some(voice) = self.voices.get(next) {
            self.profile.active_voice_id.clone_from(&voice.id);
        }
    }

    /// Restore the startup profile
    pub fn reset(&mut self) {
        self.profile = self.defaults.clone();
    }

    /// Release the synthesizer's audio resources
    ///
    /// Later calls to speak are refused. Repeated calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.synthesizer.stop();
        tracing::debug!("voice output shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

fn find_voice<'a>(voices: &'a [VoiceInfo], wanted: &str) -> Option<&'a VoiceInfo> {
    voices
        .iter()
        .find(|v| v.id.eq_ignore_ascii_case(wanted) || v.name.eq_ignore_ascii_case(wanted))
}
