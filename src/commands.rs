//! Local voice commands handled without the language model
//!
//! A fixed, ordered table maps trigger phrases to voice adjustments. Matching
//! is a case-insensitive substring test and the first matching entry wins.

use crate::voice::VoiceOutput;

/// Words per minute added or removed by one rate command
pub const RATE_STEP: i64 = 50;

/// Volume added or removed by one volume command
pub const VOLUME_STEP: f32 = 0.1;

/// A voice adjustment triggered by a spoken command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Raise the speaking rate by [`RATE_STEP`]
    FasterRate,
    /// Lower the speaking rate by [`RATE_STEP`]
    SlowerRate,
    /// Raise the volume by [`VOLUME_STEP`]
    LouderVolume,
    /// Lower the volume by [`VOLUME_STEP`]
    SofterVolume,
    /// Switch to the next voice, wrapping around
    NextVoice,
    /// Switch to the previous voice, wrapping around
    PreviousVoice,
    /// Restore the startup voice settings
    ResetVoice,
}

impl CommandAction {
    /// Apply the adjustment to `output`
    pub fn apply(self, output: &mut VoiceOutput) {
        match self {
            Self::FasterRate => output.adjust_rate(RATE_STEP),
            Self::SlowerRate => output.adjust_rate(-RATE_STEP),
            Self::LouderVolume => output.adjust_volume(VOLUME_STEP),
            Self::SofterVolume => output.adjust_volume(-VOLUME_STEP),
            Self::NextVoice => output.cycle_voice(1),
            Self::PreviousVoice => output.cycle_voice(-1),
            Self::ResetVoice => output.reset(),
        }
    }

    /// Short phrase spoken after the adjustment
    #[must_use]
    pub const fn confirmation(self) -> &'static str {
        match self {
            Self::FasterRate => "Okay, speaking faster.",
            Self::SlowerRate => "Okay, speaking slower.",
            Self::LouderVolume => "Okay, speaking louder.",
            Self::SofterVolume => "Okay, speaking softer.",
            Self::NextVoice | Self::PreviousVoice => "Voice changed.",
            Self::ResetVoice => "Voice settings restored.",
        }
    }
}

/// Built-in command table, in match priority order
const COMMANDS: &[(&str, CommandAction)] = &[
    ("speak faster", CommandAction::FasterRate),
    ("speak slower", CommandAction::SlowerRate),
    ("speak louder", CommandAction::LouderVolume),
    ("volume up", CommandAction::LouderVolume),
    ("speak softer", CommandAction::SofterVolume),
    ("volume down", CommandAction::SofterVolume),
    ("next voice", CommandAction::NextVoice),
    ("change voice", CommandAction::NextVoice),
    ("previous voice", CommandAction::PreviousVoice),
    ("reset voice", CommandAction::ResetVoice),
];

/// Matches utterances against the command table
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    commands: &'static [(&'static str, CommandAction)],
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDispatcher {
    /// Dispatcher over the built-in command table
    #[must_use]
    pub const fn new() -> Self {
        Self { commands: COMMANDS }
    }

    /// Trigger phrases in priority order
    pub fn triggers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|(trigger, _)| *trigger)
    }

    /// Find the first command whose trigger occurs in `text`
    #[must_use]
    pub fn match_action(&self, text: &str) -> Option<CommandAction> {
        let lowered = text.to_lowercase();
        self.commands
            .iter()
            .find(|(trigger, _)| lowered.contains(trigger))
            .map(|(_, action)| *action)
    }

    /// Apply the matching command to `output`
    ///
    /// Returns the applied action, or `None` when `text` is not a command
    /// and should go to the language model.
    pub fn try_dispatch(&self, text: &str, output: &mut VoiceOutput) -> Option<CommandAction> {
        let action = self.match_action(text)?;
        action.apply(output);

        tracing::info!(
            ?action,
            rate = output.profile().rate(),
            volume = output.profile().volume(),
            voice = output.profile().active_voice_id(),
            "voice command applied"
        );

        Some(action)
    }
}
