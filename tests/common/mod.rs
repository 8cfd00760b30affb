//! Shared test utilities
//!
//! Scripted stand-ins for the microphone, the synthesizer and the language
//! model process, so the conversation loop can run without audio hardware.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use murmur::config::{ConversationConfig, LlmConfig, TtsConfig};
use murmur::process::{CommandRunner, ProcessOutput};
use murmur::voice::{
    CaptureFailure, Listener, Synthesizer, Utterance, VoiceInfo, VoiceOutput, VoiceProfile,
};
use murmur::{ConversationController, ConversationLog, Error, LanguageModelBridge, StopSignal};

/// Yields scripted capture results in order
pub struct ScriptedListener {
    script: VecDeque<Result<Utterance, CaptureFailure>>,
    stop_when_exhausted: Option<StopSignal>,
}

impl ScriptedListener {
    /// Listener that hears `lines` in order, then only silence
    pub fn new(lines: &[&str]) -> Self {
        Self {
            script: lines.iter().map(|l| Ok(Utterance::new(*l))).collect(),
            stop_when_exhausted: None,
        }
    }

    /// Listener replaying arbitrary capture results
    pub fn from_results(results: Vec<Result<Utterance, CaptureFailure>>) -> Self {
        Self {
            script: results.into(),
            stop_when_exhausted: None,
        }
    }

    /// Request a stop once the script runs out
    #[must_use]
    pub fn stopping(mut self, stop: StopSignal) -> Self {
        self.stop_when_exhausted = Some(stop);
        self
    }
}

#[async_trait(?Send)]
impl Listener for ScriptedListener {
    async fn listen(&mut self) -> Result<Utterance, CaptureFailure> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }

        if let Some(stop) = &self.stop_when_exhausted {
            stop.request();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(CaptureFailure::Timeout)
    }
}

/// One phrase as it was spoken
#[derive(Debug, Clone, PartialEq)]
pub struct Spoken {
    pub text: String,
    pub rate: u32,
    pub volume: f32,
    pub voice: String,
    pub at: Instant,
}

/// Shared record of everything a [`RecordingSynthesizer`] said
pub type SpokenLog = Arc<Mutex<Vec<Spoken>>>;

/// Records speech instead of playing it
pub struct RecordingSynthesizer {
    spoken: SpokenLog,
    voices: Vec<VoiceInfo>,
}

impl RecordingSynthesizer {
    /// Synthesizer with voices "alpha", "beta" and "gamma"
    pub fn new() -> (Self, SpokenLog) {
        let spoken = SpokenLog::default();
        let synth = Self {
            spoken: Arc::clone(&spoken),
            voices: ["alpha", "beta", "gamma"]
                .iter()
                .map(|id| VoiceInfo::named(id))
                .collect(),
        };
        (synth, spoken)
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn speak(&mut self, text: &str, profile: &VoiceProfile) -> murmur::Result<()> {
        self.spoken.lock().unwrap().push(Spoken {
            text: text.to_string(),
            rate: profile.rate(),
            volume: profile.volume(),
            voice: profile.active_voice_id().to_string(),
            at: Instant::now(),
        });
        Ok(())
    }
}

/// Texts spoken so far
pub fn texts(spoken: &SpokenLog) -> Vec<String> {
    spoken.lock().unwrap().iter().map(|s| s.text.clone()).collect()
}

/// How the fake language model process behaves
#[derive(Debug, Clone)]
pub enum ModelBehavior {
    /// Exit 0 with this stdout
    Reply(String),
    /// Exit with this non-zero code
    Fail(i32),
    /// Exceed the timeout
    Timeout,
    /// Program cannot be spawned
    Missing,
}

/// Stands in for the language model process
pub struct ScriptedRunner {
    behavior: ModelBehavior,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(behavior: ModelBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(ModelBehavior::Reply(text.to_string()))
    }

    /// Argument lists received, in order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Last argument of every call, which is the prompt for a model query
    pub fn prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|args| args.last().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        _program: &str,
        args: &[String],
        limit: Duration,
    ) -> murmur::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(args.to_vec());

        match &self.behavior {
            ModelBehavior::Reply(text) => Ok(ProcessOutput {
                code: Some(0),
                stdout: format!("{text}\n"),
                stderr: String::new(),
            }),
            ModelBehavior::Fail(code) => Ok(ProcessOutput {
                code: Some(*code),
                stdout: String::new(),
                stderr: "model not found".to_string(),
            }),
            ModelBehavior::Timeout => Err(Error::Timeout(format!("{limit:?}"))),
            ModelBehavior::Missing => Err(Error::Process("failed to spawn".to_string())),
        }
    }
}

/// Conversation settings with no pauses
pub fn quick_conversation(wake_phrase: Option<&str>) -> ConversationConfig {
    ConversationConfig {
        wake_phrase: wake_phrase.map(str::to_string),
        pre_listen_pause: Duration::ZERO,
        post_reply_pause: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
        ..ConversationConfig::default()
    }
}

/// A controller wired to fakes, plus handles to inspect them
pub struct Harness {
    pub controller: ConversationController<ScriptedListener>,
    pub spoken: SpokenLog,
    pub runner: Arc<ScriptedRunner>,
    pub stop: StopSignal,
    pub log_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Build a harness around `listener`
    pub fn new(
        wake_phrase: Option<&str>,
        listener: ScriptedListener,
        runner: Arc<ScriptedRunner>,
        stop: StopSignal,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("logs").join("conversation_log.txt");

        let (synth, spoken) = RecordingSynthesizer::new();
        let output = VoiceOutput::new(Box::new(synth), &TtsConfig::default()).unwrap();
        let bridge = LanguageModelBridge::new(runner.clone(), &LlmConfig::default());

        let controller = ConversationController::new(
            &quick_conversation(wake_phrase),
            listener,
            output,
            bridge,
            ConversationLog::new(&log_path),
            stop.clone(),
        );

        Self {
            controller,
            spoken,
            runner,
            stop,
            log_path,
            _dir: dir,
        }
    }

    /// Harness hearing `lines`, stopping once they run out
    pub fn scripted(
        wake_phrase: Option<&str>,
        lines: &[&str],
        runner: Arc<ScriptedRunner>,
    ) -> Self {
        let stop = StopSignal::new();
        let listener = ScriptedListener::new(lines).stopping(stop.clone());
        Self::new(wake_phrase, listener, runner, stop)
    }

    /// Texts spoken so far
    pub fn spoken_texts(&self) -> Vec<String> {
        texts(&self.spoken)
    }

    /// Records in the conversation log
    pub fn records(&self) -> Vec<murmur::ConversationRecord> {
        ConversationLog::new(&self.log_path).records().unwrap()
    }
}
