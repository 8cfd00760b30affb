//! Audio capture from microphone
//!
//! [`AudioCapture`] turns one spoken phrase into an [`Utterance`]: it opens
//! the input device for the duration of a single `listen` call, calibrates
//! against ambient noise, waits for a phrase and hands the audio to a
//! [`Transcriber`].

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};

use super::detector::{SpeechDetector, rms, samples_for};
use super::stt::Transcriber;
use crate::config::CaptureConfig;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the microphone buffer is drained while listening
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ambient energy multiplier when the threshold adapts to the room
const DYNAMIC_ENERGY_RATIO: f32 = 1.5;

/// A successfully transcribed phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Transcribed text
    pub text: String,
    /// When the transcription completed
    pub timestamp: DateTime<Local>,
}

impl Utterance {
    /// Create an utterance stamped with the current time
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

/// Why a capture attempt produced no utterance
///
/// None of these are fatal to the conversation; the caller listens again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureFailure {
    /// No speech started within the listen timeout
    #[error("no speech detected")]
    Timeout,

    /// Audio was captured but produced no text
    #[error("speech was not intelligible")]
    Unintelligible,

    /// The transcription service failed or could not be reached
    #[error("transcription backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The microphone could not be opened
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Source of utterances for the conversation controller
///
/// Futures are not required to be `Send`: audio streams stay on the thread
/// that opened them.
#[async_trait(?Send)]
pub trait Listener {
    /// Block until one phrase is captured and transcribed
    async fn listen(&mut self) -> std::result::Result<Utterance, CaptureFailure>;
}

/// Open input stream, released when dropped
struct Microphone {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
    channels: usize,
}

impl Microphone {
    /// Open the named input device, or the default one
    fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| Error::Audio(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| Error::Audio(format!("input device not found: {name}")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| Error::Audio("no input device available".to_string()))?,
        };

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| {
                c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();
        let channels = usize::from(config.channels);

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels,
            "microphone opened"
        );

        Ok(Self {
            _stream: stream,
            buffer,
            channels,
        })
    }

    /// Take everything captured since the last call, mixed down to mono
    #[allow(clippy::cast_precision_loss)]
    fn take(&self) -> Vec<f32> {
        let raw = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        if self.channels <= 1 {
            return raw;
        }

        raw.chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        tracing::debug!("microphone released");
    }
}

/// Captures one phrase per `listen` call and transcribes it
pub struct AudioCapture {
    config: CaptureConfig,
    transcriber: Box<dyn Transcriber>,
}

impl AudioCapture {
    /// Create a capture front end
    #[must_use]
    pub fn new(config: CaptureConfig, transcriber: Box<dyn Transcriber>) -> Self {
        Self {
            config,
            transcriber,
        }
    }

    /// Record one phrase from the microphone
    ///
    /// The device is held only for the duration of this call.
    async fn record_phrase(&self) -> std::result::Result<Vec<f32>, CaptureFailure> {
        let mic = Microphone::open(self.config.device.as_deref())
            .map_err(|e| CaptureFailure::DeviceUnavailable(e.to_string()))?;

        let threshold = self.calibrate(&mic).await;
        let mut detector = SpeechDetector::with_durations(
            threshold,
            self.config.phrase_threshold,
            self.config.pause_threshold,
            SAMPLE_RATE,
        );
        let max_phrase = samples_for(self.config.max_phrase, SAMPLE_RATE);

        tracing::debug!(threshold, "waiting for speech");
        let started = Instant::now();

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let chunk = mic.take();
            if !chunk.is_empty() && detector.process(&chunk) {
                return Ok(detector.take_phrase());
            }

            if detector.phrase_len() >= max_phrase {
                tracing::debug!("phrase hit length limit");
                return Ok(detector.take_phrase());
            }

            if detector.phrase_len() == 0 && started.elapsed() >= self.config.listen_timeout {
                return Err(CaptureFailure::Timeout);
            }
        }
    }

    /// Measure ambient noise and derive the speech threshold
    async fn calibrate(&self, mic: &Microphone) -> f32 {
        tokio::time::sleep(self.config.calibration).await;
        let ambient = rms(&mic.take());

        let threshold = if self.config.dynamic_energy {
            self.config.energy_threshold.max(ambient * DYNAMIC_ENERGY_RATIO)
        } else {
            self.config.energy_threshold
        };

        tracing::debug!(ambient, threshold, "calibrated for ambient noise");
        threshold
    }
}

#[async_trait(?Send)]
impl Listener for AudioCapture {
    async fn listen(&mut self) -> std::result::Result<Utterance, CaptureFailure> {
        let samples = self.record_phrase().await?;

        let wav = samples_to_wav(&samples, SAMPLE_RATE).map_err(|e| {
            tracing::warn!(error = %e, "failed to encode captured audio");
            CaptureFailure::Unintelligible
        })?;

        if let Some(path) = &self.config.debug_audio_path {
            save_debug_audio(path, &wav);
        }

        match self.transcriber.transcribe(&wav).await {
            Ok(text) if text.trim().is_empty() => Err(CaptureFailure::Unintelligible),
            Ok(text) => Ok(Utterance::new(text.trim())),
            Err(e) => Err(CaptureFailure::BackendUnavailable(e.to_string())),
        }
    }
}

fn save_debug_audio(path: &Path, wav: &[u8]) {
    match std::fs::write(path, wav) {
        Ok(()) => tracing::trace!(path = %path.display(), "saved debug audio"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to save debug audio"),
    }
}

/// Sample the default microphone for `duration` and return the mono audio
///
/// Used by the `test-mic` command.
///
/// # Errors
///
/// Returns error if the input device cannot be opened
pub async fn sample_microphone(device: Option<&str>, duration: Duration) -> Result<Vec<f32>> {
    let mic = Microphone::open(device)?;
    tokio::time::sleep(duration).await;
    Ok(mic.take())
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
