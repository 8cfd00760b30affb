//! Daemon - builds the assistant and supervises the conversation worker
//!
//! The conversation runs on its own OS thread with a single-threaded
//! runtime. The controlling thread only watches: it polls the worker for
//! completion and turns Ctrl-C into a stop request, which the worker honours
//! at its next turn boundary.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bridge::LanguageModelBridge;
use crate::config::{Config, TtsConfig, TtsProvider};
use crate::controller::ConversationController;
use crate::process::{CommandRunner, SystemRunner};
use crate::session::StopSignal;
use crate::transcript::ConversationLog;
use crate::voice::{
    AudioCapture, EspeakSynthesizer, Listener, OpenAiSynthesizer, SpeechToText, Synthesizer,
    VoiceOutput,
};
use crate::{Error, Result};

/// Name of the worker thread
pub const WORKER_THREAD_NAME: &str = "conversation";

/// The murmur daemon
pub struct Daemon {
    config: Config,
    runner: Arc<dyn CommandRunner>,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runner: Arc::new(SystemRunner),
        }
    }

    /// Run until the conversation ends or Ctrl-C is pressed
    ///
    /// # Errors
    ///
    /// Returns error if a component cannot be built or the worker fails
    pub async fn run(self) -> Result<()> {
        preflight(&self.config);

        let stop = StopSignal::new();
        let controller = self.build_controller(stop.clone()).await?;
        let worker = spawn_worker(controller)?;

        let interrupt = async {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("cannot listen for Ctrl-C; stop with a termination phrase");
                std::future::pending::<()>().await;
            }
        };

        supervise(
            worker,
            &stop,
            interrupt,
            self.config.conversation.poll_interval,
        )
        .await
    }

    /// Build every component and hand them to a controller
    ///
    /// # Errors
    ///
    /// Returns error if transcription or synthesis cannot be set up
    pub async fn build_controller(
        &self,
        stop: StopSignal,
    ) -> Result<ConversationController<AudioCapture>> {
        let transcriber = SpeechToText::from_config(&self.config.stt)?;
        let capture = AudioCapture::new(self.config.capture.clone(), Box::new(transcriber));
        let output = build_voice_output(&self.config.tts, Arc::clone(&self.runner)).await?;
        let bridge = LanguageModelBridge::new(Arc::clone(&self.runner), &self.config.llm);
        let log = ConversationLog::new(&self.config.log_path);

        tracing::info!(
            stt = ?self.config.stt.provider,
            tts = ?self.config.tts.provider,
            llm = %self.config.llm.program,
            model = %self.config.llm.model,
            log = %log.path().display(),
            "components ready"
        );

        Ok(ConversationController::new(
            &self.config.conversation,
            capture,
            output,
            bridge,
            log,
            stop,
        ))
    }
}

/// Build voice output over the configured synthesizer
///
/// # Errors
///
/// Returns error if the synthesizer cannot be created or offers no voices
pub async fn build_voice_output(
    config: &TtsConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<VoiceOutput> {
    let synthesizer: Box<dyn Synthesizer> = match config.provider {
        TtsProvider::Espeak => Box::new(
            EspeakSynthesizer::discover(runner, &config.program, config.timeout).await?,
        ),
        TtsProvider::OpenAi => Box::new(OpenAiSynthesizer::from_config(config)?),
    };

    VoiceOutput::new(synthesizer, config)
}

/// Warn about external programs that are not on `PATH`
pub fn preflight(config: &Config) {
    for program in config.required_programs() {
        if which::which(program).is_err() {
            tracing::warn!(program, "program not found on PATH");
        }
    }
}

/// Start `controller` on a dedicated worker thread
///
/// The worker owns a current-thread runtime, so capture streams and child
/// processes never leave it.
///
/// # Errors
///
/// Returns error if the thread cannot be spawned
pub fn spawn_worker<L>(mut controller: ConversationController<L>) -> Result<JoinHandle<Result<()>>>
where
    L: Listener + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || -> Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(controller.run());
            Ok(())
        })?;

    Ok(handle)
}

/// Wait for the worker, turning `interrupt` into a stop request
///
/// The worker is checked every `poll` interval. When `interrupt` completes
/// the stop signal is raised once and the worker is allowed to finish its
/// current turn; it is never preempted.
///
/// # Errors
///
/// Returns the worker's error, or [`Error::Process`] if it panicked
pub async fn supervise<F>(
    worker: JoinHandle<Result<()>>,
    stop: &StopSignal,
    interrupt: F,
    poll: Duration,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut interrupted = false;

    while !worker.is_finished() {
        tokio::select! {
            () = &mut interrupt, if !interrupted => {
                interrupted = true;
                tracing::info!("interrupt received, finishing current turn");
                stop.request();
            }
            () = tokio::time::sleep(poll) => {}
        }
    }

    match worker.join() {
        Ok(result) => {
            tracing::debug!("conversation worker joined");
            result
        }
        Err(_) => Err(Error::Process("conversation worker panicked".to_string())),
    }
}
