//! Conversation loop and wake-word state machine
//!
//! One turn is: pause, listen, then either wake up, run a local voice
//! command, or ask the language model and speak the reply. Turns run
//! strictly one after another until a termination phrase is heard or a stop
//! is requested from the controlling thread.

use std::time::Duration;

use crate::Result;
use crate::bridge::LanguageModelBridge;
use crate::commands::{CommandAction, CommandDispatcher};
use crate::config::ConversationConfig;
use crate::session::{Phase, SessionState, StopSignal};
use crate::transcript::ConversationLog;
use crate::voice::{CaptureFailure, Listener, Utterance, VoiceOutput};

/// Phrases that end the conversation from any phase
pub const TERMINATION_PHRASES: [&str; 4] = ["close bot", "exit", "stop", "quit"];

/// Spoken when an active turn produced audio but no text
pub const NOT_UNDERSTOOD_REPLY: &str = "Sorry, I did not understand that.";

/// Pause after a failed turn before listening again
const RECOVERY_PAUSE: Duration = Duration::from_secs(1);

/// What a single turn did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Capture produced no utterance
    Idle,
    /// Utterance heard while waiting for the wake phrase, not containing it
    Ignored,
    /// Wake phrase heard; now active
    Woke,
    /// A local voice command was applied
    Dispatched(CommandAction),
    /// The language model answered
    Answered(String),
    /// A stop was requested while the turn was in progress
    Interrupted,
    /// A termination phrase was heard
    Terminated,
}

/// Whether `text` is a termination phrase
///
/// Surrounding whitespace and trailing sentence punctuation are ignored, so
/// "Quit." and " stop! " both count.
#[must_use]
pub fn is_termination_phrase(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase();
    TERMINATION_PHRASES.contains(&normalized.as_str())
}

/// Whether `text` contains `wake_phrase`, ignoring case
#[must_use]
pub fn contains_wake_phrase(text: &str, wake_phrase: &str) -> bool {
    text.to_lowercase().contains(&wake_phrase.to_lowercase())
}

/// Drives the conversation on the worker thread
pub struct ConversationController<L> {
    listener: L,
    output: VoiceOutput,
    dispatcher: CommandDispatcher,
    bridge: LanguageModelBridge,
    log: ConversationLog,
    session: SessionState,
    wake_phrase: Option<String>,
    acknowledgement: String,
    farewell: String,
    pre_listen_pause: Duration,
    post_reply_pause: Duration,
}

impl<L: Listener> ConversationController<L> {
    /// Create a controller
    ///
    /// Starts waiting for the wake phrase when one is configured, otherwise
    /// starts active.
    #[must_use]
    pub fn new(
        config: &ConversationConfig,
        listener: L,
        output: VoiceOutput,
        bridge: LanguageModelBridge,
        log: ConversationLog,
        stop: StopSignal,
    ) -> Self {
        let wake_phrase = config
            .wake_phrase
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            listener,
            output,
            dispatcher: CommandDispatcher::new(),
            bridge,
            log,
            session: SessionState::new(wake_phrase.is_some(), stop),
            wake_phrase,
            acknowledgement: config.acknowledgement.clone(),
            farewell: config.farewell.clone(),
            pre_listen_pause: config.pre_listen_pause,
            post_reply_pause: config.post_reply_pause,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Session state
    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    /// Voice output, for inspecting the live profile
    #[must_use]
    pub const fn output(&self) -> &VoiceOutput {
        &self.output
    }

    /// Run turns until terminated or stopped
    ///
    /// Turn errors are logged and the loop keeps listening. On exit the
    /// session is marked terminated and the synthesizer is shut down.
    pub async fn run(&mut self) {
        tracing::info!(
            wake_phrase = ?self.wake_phrase,
            phase = ?self.session.phase(),
            "conversation started"
        );

        while !self.session.stop_requested() {
            match self.turn().await {
                Ok(TurnOutcome::Terminated | TurnOutcome::Interrupted) => break,
                Ok(outcome) => tracing::trace!(?outcome, "turn complete"),
                Err(e) => {
                    if self.session.stop_requested() {
                        break;
                    }
                    tracing::error!(error = %e, "turn failed");
                    self.pause(RECOVERY_PAUSE).await;
                }
            }
        }

        self.session.terminate();
        self.output.shutdown();
        tracing::info!("conversation ended");
    }

    /// Run one full turn, including capture
    ///
    /// # Errors
    ///
    /// Returns error if the conversation log cannot be written
    pub async fn turn(&mut self) -> Result<TurnOutcome> {
        if self.session.phase() == Phase::Terminated {
            return Ok(TurnOutcome::Terminated);
        }

        self.pause(self.pre_listen_pause).await;
        if self.session.stop_requested() {
            return Ok(TurnOutcome::Interrupted);
        }

        tracing::debug!(phase = ?self.session.phase(), "listening");
        let heard = self.listener.listen().await;

        if self.session.stop_requested() {
            return Ok(TurnOutcome::Interrupted);
        }

        match heard {
            Ok(utterance) => self.handle_utterance(&utterance).await,
            Err(failure) => {
                self.report_capture_failure(&failure).await;
                Ok(TurnOutcome::Idle)
            }
        }
    }

    /// Act on a captured utterance
    ///
    /// # Errors
    ///
    /// Returns error if the conversation log cannot be written
    pub async fn handle_utterance(&mut self, utterance: &Utterance) -> Result<TurnOutcome> {
        let text = utterance.text.trim();
        tracing::info!(user = %text, phase = ?self.session.phase(), "heard");

        if is_termination_phrase(text) {
            tracing::info!("termination phrase heard");
            self.output.speak(&self.farewell).await;
            self.session.terminate();
            return Ok(TurnOutcome::Terminated);
        }

        match self.session.phase() {
            Phase::Terminated => Ok(TurnOutcome::Terminated),
            Phase::AwaitingWakeWord => {
                let woke = self
                    .wake_phrase
                    .as_deref()
                    .is_some_and(|phrase| contains_wake_phrase(text, phrase));

                if !woke {
                    return Ok(TurnOutcome::Ignored);
                }

                tracing::info!("wake phrase heard");
                self.output.speak(&self.acknowledgement).await;
                self.session.activate();
                Ok(TurnOutcome::Woke)
            }
            Phase::Active => {
                if let Some(action) = self.dispatcher.try_dispatch(text, &mut self.output) {
                    self.output.speak(action.confirmation()).await;
                    return Ok(TurnOutcome::Dispatched(action));
                }

                let reply = self.bridge.query(text).await;
                tracing::info!(assistant = %reply, "reply");

                self.output.speak(&reply).await;
                self.log.append(text, &reply)?;
                self.pause(self.post_reply_pause).await;

                Ok(TurnOutcome::Answered(reply))
            }
        }
    }

    async fn report_capture_failure(&mut self, failure: &CaptureFailure) {
        match failure {
            CaptureFailure::Timeout => tracing::debug!("no speech before timeout"),
            CaptureFailure::Unintelligible => {
                tracing::info!("speech not understood");
                if self.session.phase() == Phase::Active {
                    self.output.speak(NOT_UNDERSTOOD_REPLY).await;
                }
            }
            CaptureFailure::BackendUnavailable(_) | CaptureFailure::DeviceUnavailable(_) => {
                tracing::warn!(error = %failure, "capture failed");
            }
        }
    }

    async fn pause(&self, duration: Duration) {
        if duration.is_zero() || self.session.stop_requested() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_phrases() {
        for text in ["quit", "Quit.", "  STOP! ", "close bot", "Exit?", "exit,"] {
            assert!(is_termination_phrase(text), "{text}");
        }
        for text in ["please stop talking", "quitting time", "", "close"] {
            assert!(!is_termination_phrase(text), "{text}");
        }
    }

    #[test]
    fn test_wake_phrase_matching() {
        assert!(contains_wake_phrase("Hey Assistant, are you there", "hey assistant"));
        assert!(contains_wake_phrase("okay HEY ASSISTANT", "Hey assistant"));
        assert!(!contains_wake_phrase("hey there", "hey assistant"));
    }
}
