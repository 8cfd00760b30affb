//! Bridge to a locally hosted language model run as an external process
//!
//! The bridge never fails: any problem with the backend turns into one of two
//! fixed fallback replies so the conversation loop can always speak something.

use std::sync::Arc;
use std::time::Duration;

use crate::Error;
use crate::config::LlmConfig;
use crate::process::CommandRunner;

/// Instruction prepended to every prompt
pub const BRIEF_PREAMBLE: &str = "Respond briefly in 1-2 sentences only.";

/// Reply when the backend ran but produced no usable answer
pub const UNSURE_REPLY: &str = "I'm not sure about that.";

/// Reply when the backend could not be run to completion
pub const TROUBLE_REPLY: &str = "I'm having trouble with that request.";

/// Sends user text to the inference backend
pub struct LanguageModelBridge {
    runner: Arc<dyn CommandRunner>,
    program: String,
    args: Vec<String>,
    preamble: String,
    timeout: Duration,
}

impl LanguageModelBridge {
    /// Create a bridge from configuration
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, config: &LlmConfig) -> Self {
        let mut args = config.args.clone();
        if !config.model.is_empty() {
            args.push(config.model.clone());
        }

        Self {
            runner,
            program: config.program.clone(),
            args,
            preamble: config.preamble.clone(),
            timeout: config.timeout,
        }
    }

    /// Wrap user text with the brevity instruction
    #[must_use]
    pub fn compose_prompt(&self, text: &str) -> String {
        format!("{}\nUser query: {text}", self.preamble)
    }

    /// Ask the model and return its reply
    ///
    /// Always returns non-empty text within the configured timeout
    pub async fn query(&self, text: &str) -> String {
        let mut args = self.args.clone();
        args.push(self.compose_prompt(text));

        tracing::debug!(program = %self.program, "querying language model");

        match self.runner.run(&self.program, &args, self.timeout).await {
            Ok(output) if output.success() => {
                let reply = output.stdout.trim();
                if reply.is_empty() {
                    tracing::warn!("language model returned an empty reply");
                    UNSURE_REPLY.to_string()
                } else {
                    reply.to_string()
                }
            }
            Ok(output) => {
                tracing::warn!(
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "language model exited with failure"
                );
                UNSURE_REPLY.to_string()
            }
            Err(Error::Timeout(msg)) => {
                tracing::warn!(%msg, "language model timed out");
                TROUBLE_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "language model unavailable");
                TROUBLE_REPLY.to_string()
            }
        }
    }
}
