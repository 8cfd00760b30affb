//! Murmur - hands-free voice assistant for a local language model
//!
//! This library provides the pieces of the assistant:
//! - Audio capture with energy-based endpointing and hosted transcription
//! - Speech output with an adjustable voice profile
//! - Local voice commands that tune the voice without the model
//! - A bridge to a language model run as an external process
//! - An append-only conversation log
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ controlling thread: Daemon::run -> supervise         │
//! │   polls worker, Ctrl-C -> StopSignal::request        │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ StopSignal (AtomicBool)
//! ┌────────────────────────▼─────────────────────────────┐
//! │ worker thread "conversation": ConversationController │
//! │   AudioCapture -> CommandDispatcher | LLM bridge     │
//! │                -> VoiceOutput + ConversationLog      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod process;
pub mod session;
pub mod transcript;
pub mod voice;

pub use bridge::LanguageModelBridge;
pub use commands::{CommandAction, CommandDispatcher};
pub use config::Config;
pub use controller::{ConversationController, TurnOutcome};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use process::{CommandRunner, ProcessOutput, SystemRunner};
pub use session::{Phase, SessionState, StopSignal};
pub use transcript::{ConversationLog, ConversationRecord};
