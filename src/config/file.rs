//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` (or `$MURMUR_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Wake phrase, pacing and fixed phrases
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Microphone and endpointing
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Speech recognition backend
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Speech synthesis backend
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Language model process
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Conversation log
    #[serde(default)]
    pub log: LogFileConfig,

    /// API keys for hosted services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Conversation flow configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Phrase that activates the assistant; empty disables the wake step
    pub wake_phrase: Option<String>,
    /// Spoken after the wake phrase is heard
    pub acknowledgement: Option<String>,
    /// Spoken before shutting down
    pub farewell: Option<String>,
    pub pre_listen_pause_ms: Option<u64>,
    pub post_reply_pause_ms: Option<u64>,
    /// How often the supervisor checks the worker
    pub poll_interval_ms: Option<u64>,
}

/// Capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Input device name (default device when unset)
    pub device: Option<String>,
    pub calibration_ms: Option<u64>,
    pub listen_timeout_secs: Option<u64>,
    pub energy_threshold: Option<f32>,
    pub dynamic_energy: Option<bool>,
    pub phrase_threshold_ms: Option<u64>,
    pub pause_threshold_ms: Option<u64>,
    pub max_phrase_secs: Option<u64>,
    /// Where to write the last captured phrase as WAV
    pub debug_audio_path: Option<PathBuf>,
}

/// STT configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// TTS configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "espeak" or "openai"
    pub provider: Option<String>,
    /// Synthesizer executable for the espeak provider
    pub program: Option<String>,
    pub voice: Option<String>,
    pub rate: Option<u32>,
    pub volume: Option<f32>,
    /// Hosted model for the openai provider (e.g. "tts-1")
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Language model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Executable to run (e.g. "ollama")
    pub program: Option<String>,
    /// Arguments placed before the model name
    pub args: Option<Vec<String>>,
    pub model: Option<String>,
    /// Instruction prepended to every prompt
    pub preamble: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Conversation log configuration
#[derive(Debug, Default, Deserialize)]
pub struct LogFileConfig {
    pub path: Option<PathBuf>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from `$MURMUR_CONFIG` or the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> crate::Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `$MURMUR_CONFIG` or `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MURMUR_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml"))
}
