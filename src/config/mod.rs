//! Configuration management
//!
//! Values are resolved per field in the order environment variable, TOML
//! file, built-in default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::BRIEF_PREAMBLE;
use crate::voice::{DEFAULT_RATE, DEFAULT_VOLUME};
use crate::{Error, Result};

use file::ConfigFile;

/// Wake phrase used when none is configured
pub const DEFAULT_WAKE_PHRASE: &str = "hey assistant";

/// Spoken once when the wake phrase is heard
pub const DEFAULT_ACKNOWLEDGEMENT: &str = "Hello! How can I help you?";

/// Spoken before the assistant shuts down
pub const DEFAULT_FAREWELL: &str = "Goodbye! Have a great day!";

/// File name of the conversation log inside the data directory
pub const LOG_FILE_NAME: &str = "conversation_log.txt";

/// Murmur configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Conversation flow
    pub conversation: ConversationConfig,

    /// Microphone and endpointing
    pub capture: CaptureConfig,

    /// Speech recognition
    pub stt: SttConfig,

    /// Speech synthesis
    pub tts: TtsConfig,

    /// Language model process
    pub llm: LlmConfig,

    /// Conversation log file
    pub log_path: PathBuf,

    /// Path to data directory
    pub data_dir: PathBuf,
}

/// Conversation flow configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Phrase that activates the assistant; `None` starts active
    pub wake_phrase: Option<String>,

    /// Spoken once when the wake phrase is heard
    pub acknowledgement: String,

    /// Spoken before shutting down
    pub farewell: String,

    /// Pause before each listen
    pub pre_listen_pause: Duration,

    /// Pause after speaking a reply
    pub post_reply_pause: Duration,

    /// Supervisor check interval
    pub poll_interval: Duration,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_phrase: Some(DEFAULT_WAKE_PHRASE.to_string()),
            acknowledgement: DEFAULT_ACKNOWLEDGEMENT.to_string(),
            farewell: DEFAULT_FAREWELL.to_string(),
            pre_listen_pause: Duration::from_millis(500),
            post_reply_pause: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Input device name; default device when `None`
    pub device: Option<String>,

    /// Ambient noise sampling before each listen
    pub calibration: Duration,

    /// Longest wait for speech to start
    pub listen_timeout: Duration,

    /// Minimum RMS energy counted as speech
    pub energy_threshold: f32,

    /// Raise the threshold above measured ambient noise
    pub dynamic_energy: bool,

    /// Speech required before a phrase can end
    pub phrase_threshold: Duration,

    /// Trailing silence that ends a phrase
    pub pause_threshold: Duration,

    /// Longest phrase recorded
    pub max_phrase: Duration,

    /// Where to write each captured phrase as WAV
    pub debug_audio_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            calibration: Duration::from_secs(1),
            listen_timeout: Duration::from_secs(10),
            energy_threshold: 0.03,
            dynamic_energy: true,
            phrase_threshold: Duration::from_millis(300),
            pause_threshold: Duration::from_secs(2),
            max_phrase: Duration::from_secs(30),
            debug_audio_path: None,
        }
    }
}

/// Speech recognition provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl SttProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown stt provider: {other}"))),
        }
    }

    const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Backend
    pub provider: SttProvider,

    /// Provider model name
    pub model: String,

    /// API key for the provider
    pub api_key: Option<String>,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: SttProvider::Whisper,
            model: SttProvider::Whisper.default_model().to_string(),
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Speech synthesis provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsProvider {
    /// Local `espeak-ng` process
    #[default]
    Espeak,
    /// `OpenAI` speech endpoint
    OpenAi,
}

impl TtsProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(Self::Espeak),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown tts provider: {other}"))),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Backend
    pub provider: TtsProvider,

    /// Executable for the espeak backend
    pub program: String,

    /// Preferred voice id or name
    pub voice: Option<String>,

    /// Startup speaking rate (words per minute)
    pub rate: u32,

    /// Startup volume
    pub volume: f32,

    /// Hosted model for the openai backend
    pub model: String,

    /// API key for the openai backend
    pub api_key: Option<String>,

    /// Synthesis timeout
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::Espeak,
            program: "espeak-ng".to_string(),
            voice: None,
            rate: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
            model: "tts-1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Language model process configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Executable to run
    pub program: String,

    /// Arguments placed before the model name
    pub args: Vec<String>,

    /// Model name appended after `args`; skipped when empty
    pub model: String,

    /// Instruction prepended to every prompt
    pub preamble: String,

    /// Longest wait for a reply
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            program: "ollama".to_string(),
            args: vec!["run".to_string()],
            model: "llama2".to_string(),
            preamble: BRIEF_PREAMBLE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Return the data directory: `~/.local/share/murmur` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".murmur"),
        |d| d.data_dir().join("murmur"),
    )
}

impl Config {
    /// Load configuration from environment, config file and defaults
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration, then apply command-line overrides
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn load_with_options(wake_phrase: Option<&str>, disable_wake_word: bool) -> Result<Self> {
        let mut config = Self::load()?;

        if let Some(phrase) = wake_phrase {
            config.conversation.wake_phrase = non_empty(phrase.to_string());
        }
        if disable_wake_word {
            config.conversation.wake_phrase = None;
        }

        Ok(config)
    }

    /// Merge a parsed config file with values from `env`
    ///
    /// `env` looks up a variable by name; values from it win over the file.
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ms = Duration::from_millis;
        let secs = Duration::from_secs;

        let conversation = {
            let defaults = ConversationConfig::default();
            let wake_phrase = match env("MURMUR_WAKE_PHRASE").or(fc.conversation.wake_phrase) {
                Some(phrase) => non_empty(phrase),
                None => defaults.wake_phrase,
            };

            ConversationConfig {
                wake_phrase,
                acknowledgement: fc
                    .conversation
                    .acknowledgement
                    .unwrap_or(defaults.acknowledgement),
                farewell: fc.conversation.farewell.unwrap_or(defaults.farewell),
                pre_listen_pause: fc
                    .conversation
                    .pre_listen_pause_ms
                    .map_or(defaults.pre_listen_pause, ms),
                post_reply_pause: fc
                    .conversation
                    .post_reply_pause_ms
                    .map_or(defaults.post_reply_pause, ms),
                poll_interval: fc
                    .conversation
                    .poll_interval_ms
                    .map_or(defaults.poll_interval, ms),
            }
        };

        let capture = {
            let defaults = CaptureConfig::default();
            let c = fc.capture;
            CaptureConfig {
                device: env("MURMUR_INPUT_DEVICE").or(c.device),
                calibration: c.calibration_ms.map_or(defaults.calibration, ms),
                listen_timeout: c.listen_timeout_secs.map_or(defaults.listen_timeout, secs),
                energy_threshold: c.energy_threshold.unwrap_or(defaults.energy_threshold),
                dynamic_energy: c.dynamic_energy.unwrap_or(defaults.dynamic_energy),
                phrase_threshold: c.phrase_threshold_ms.map_or(defaults.phrase_threshold, ms),
                pause_threshold: c.pause_threshold_ms.map_or(defaults.pause_threshold, ms),
                max_phrase: c.max_phrase_secs.map_or(defaults.max_phrase, secs),
                debug_audio_path: env("MURMUR_DEBUG_AUDIO")
                    .map(PathBuf::from)
                    .or(c.debug_audio_path),
            }
        };

        let openai_key = env("OPENAI_API_KEY").or(fc.api_keys.openai);

        let stt = {
            let defaults = SttConfig::default();
            let provider = env("MURMUR_STT_PROVIDER")
                .or(fc.stt.provider)
                .map(|p| SttProvider::parse(&p))
                .transpose()?
                .unwrap_or(defaults.provider);
            let api_key = match provider {
                SttProvider::Whisper => openai_key.clone(),
                SttProvider::Deepgram => env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            };

            SttConfig {
                provider,
                model: fc
                    .stt
                    .model
                    .unwrap_or_else(|| provider.default_model().to_string()),
                api_key,
                timeout: fc.stt.timeout_secs.map_or(defaults.timeout, secs),
            }
        };

        let tts = {
            let defaults = TtsConfig::default();
            let t = fc.tts;
            TtsConfig {
                provider: env("MURMUR_TTS_PROVIDER")
                    .or(t.provider)
                    .map(|p| TtsProvider::parse(&p))
                    .transpose()?
                    .unwrap_or(defaults.provider),
                program: t.program.unwrap_or(defaults.program),
                voice: env("MURMUR_VOICE").or(t.voice).and_then(non_empty),
                rate: t.rate.unwrap_or(defaults.rate),
                volume: t.volume.unwrap_or(defaults.volume),
                model: t.model.unwrap_or(defaults.model),
                api_key: openai_key,
                timeout: t.timeout_secs.map_or(defaults.timeout, secs),
            }
        };

        let llm = {
            let defaults = LlmConfig::default();
            let l = fc.llm;
            LlmConfig {
                program: env("MURMUR_LLM_PROGRAM")
                    .or(l.program)
                    .unwrap_or(defaults.program),
                args: l.args.unwrap_or(defaults.args),
                model: env("MURMUR_LLM_MODEL").or(l.model).unwrap_or(defaults.model),
                preamble: l.preamble.unwrap_or(defaults.preamble),
                timeout: l.timeout_secs.map_or(defaults.timeout, secs),
            }
        };

        let data_dir = env("MURMUR_DATA_DIR").map_or_else(default_data_dir, PathBuf::from);
        let log_path = env("MURMUR_LOG_PATH")
            .map(PathBuf::from)
            .or(fc.log.path)
            .unwrap_or_else(|| data_dir.join(LOG_FILE_NAME));

        Ok(Self {
            conversation,
            capture,
            stt,
            tts,
            llm,
            log_path,
            data_dir,
        })
    }

    /// External programs this configuration runs
    #[must_use]
    pub fn required_programs(&self) -> Vec<&str> {
        let mut programs = vec![self.llm.program.as_str()];
        if self.tts.provider == TtsProvider::Espeak {
            programs.push(self.tts.program.as_str());
        }
        programs
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
