//! Text-to-speech (TTS) backends
//!
//! Two synthesizers are provided: a local `espeak-ng` process and the
//! hosted `OpenAI` speech endpoint played through [`AudioPlayback`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::output::VoiceProfile;
use super::playback::AudioPlayback;
use crate::config::TtsConfig;
use crate::process::CommandRunner;
use crate::{Error, Result};

/// Speaking rate that maps to a speed factor of 1.0
const NORMAL_RATE: f32 = 150.0;

/// Voices offered by the hosted speech endpoint
const OPENAI_VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// espeak voices preferred as the starting voice, in order
const ESPEAK_ENGLISH: [&str; 3] = ["en", "en-us", "en-gb"];

/// A voice a synthesizer can speak with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Identifier passed back to the synthesizer
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Gender tag when the backend reports one
    pub gender: Option<String>,
}

impl VoiceInfo {
    /// Voice whose name is its id
    #[must_use]
    pub fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            gender: None,
        }
    }
}

/// Speaks text aloud
#[async_trait]
pub trait Synthesizer: Send {
    /// Voices this synthesizer offers, in a stable order
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak `text` with `profile`, returning when playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&mut self, text: &str, profile: &VoiceProfile) -> Result<()>;

    /// Voice to start with when none is configured
    fn default_voice(&self) -> Option<String> {
        None
    }

    /// Release audio resources
    fn stop(&mut self) {}
}

/// Speaks through a local `espeak-ng` process
pub struct EspeakSynthesizer {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
    voices: Vec<VoiceInfo>,
}

impl EspeakSynthesizer {
    /// Query the installed voices and build a synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the program cannot be run or lists no voices
    pub async fn discover(
        runner: Arc<dyn CommandRunner>,
        program: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let output = runner
            .run(program, &["--voices".to_string()], timeout)
            .await?;

        if !output.success() {
            return Err(Error::Tts(format!(
                "{program} --voices failed: {}",
                output.stderr.trim()
            )));
        }

        let voices = parse_espeak_voices(&output.stdout);
        if voices.is_empty() {
            return Err(Error::Tts(format!("{program} reported no voices")));
        }

        tracing::debug!(program, count = voices.len(), "discovered voices");

        Ok(Self {
            runner,
            program: program.to_string(),
            timeout,
            voices,
        })
    }

    fn args(text: &str, profile: &VoiceProfile) -> Vec<String> {
        // espeak amplitude runs 0-200 with 100 as normal
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let amplitude = (profile.volume() * 200.0).round() as u32;

        vec![
            "-s".to_string(),
            profile.rate().to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            "-v".to_string(),
            profile.active_voice_id().to_string(),
            // Replies such as "-5." must not be parsed as options
            "--".to_string(),
            text.to_string(),
        ]
    }
}

#[async_trait]
impl Synthesizer for EspeakSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn default_voice(&self) -> Option<String> {
        preferred_espeak_voice(&self.voices).map(|v| v.id.clone())
    }

    async fn speak(&mut self, text: &str, profile: &VoiceProfile) -> Result<()> {
        let args = Self::args(text, profile);
        let output = self.runner.run(&self.program, &args, self.timeout).await?;

        if output.success() {
            Ok(())
        } else {
            Err(Error::Tts(format!(
                "{} exited with {:?}: {}",
                self.program,
                output.code,
                output.stderr.trim()
            )))
        }
    }
}

/// Parse the table printed by `espeak-ng --voices`
///
/// Columns are `Pty Language Age/Gender VoiceName File Other`. The language
/// column is used as the voice id; duplicate ids keep their first entry.
#[must_use]
pub fn parse_espeak_voices(listing: &str) -> Vec<VoiceInfo> {
    let mut seen = HashSet::new();

    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let language = columns.next()?;
            let age_gender = columns.next()?;
            let name = columns.next()?;

            let gender = age_gender
                .rsplit('/')
                .next()
                .filter(|g| matches!(*g, "M" | "F"))
                .map(str::to_string);

            Some(VoiceInfo {
                id: language.to_string(),
                name: name.replace('_', " "),
                gender,
            })
        })
        .filter(|voice| seen.insert(voice.id.clone()))
        .collect()
}

/// English voice to use when none is configured
///
/// `espeak-ng --voices` is sorted by language, so the first entry is
/// usually Afrikaans.
#[must_use]
pub fn preferred_espeak_voice(voices: &[VoiceInfo]) -> Option<&VoiceInfo> {
    ESPEAK_ENGLISH
        .iter()
        .find_map(|id| voices.iter().find(|v| v.id.eq_ignore_ascii_case(id)))
        .or_else(|| voices.iter().find(|v| v.id.starts_with("en")))
}

/// Speaks through the hosted `OpenAI` speech endpoint
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    /// Output configuration, negotiated on first use
    playback: Option<AudioPlayback>,
}

impl OpenAiSynthesizer {
    /// Create a synthesizer from configuration
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        let api_key = config.api_key.clone().unwrap_or_default();
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(config.timeout).build()?,
            api_key,
            model: config.model.clone(),
            playback: None,
        })
    }

    /// Whether an output configuration is currently held
    #[must_use]
    pub const fn has_playback(&self) -> bool {
        self.playback.is_some()
    }

    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: profile.active_voice_id(),
            speed: speed_factor(profile.rate()),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        OPENAI_VOICES.iter().map(|id| VoiceInfo::named(id)).collect()
    }

    async fn speak(&mut self, text: &str, profile: &VoiceProfile) -> Result<()> {
        let mp3 = self.synthesize(text, profile).await?;

        let playback = match self.playback.take() {
            Some(playback) => playback,
            None => AudioPlayback::new()?,
        };
        let played = playback.play_mp3(&mp3, profile.volume());
        self.playback = Some(playback);
        played
    }

    fn stop(&mut self) {
        if self.playback.take().is_some() {
            tracing::debug!("released audio output");
        }
    }
}

/// Map a words-per-minute rate onto the endpoint's speed factor
#[allow(clippy::cast_precision_loss)]
fn speed_factor(rate: u32) -> f32 {
    (rate as f32 / NORMAL_RATE).clamp(0.25, 4.0)
}
