//! Append-only conversation transcript
//!
//! Each completed exchange is written as one human-readable block:
//!
//! ```text
//!
//! [2024-05-01 14:03:22]
//! User: what is the capital of France
//! Assistant: Paris.
//! --------------------------------------------------
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::Result;

/// Timestamp format used in the bracketed header line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the separator line closing each block
pub const SEPARATOR_WIDTH: usize = 50;

const USER_PREFIX: &str = "User: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";

/// One exchange between the user and the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    /// When the exchange completed
    pub timestamp: DateTime<Local>,
    /// What the user said
    pub user_text: String,
    /// What the assistant replied
    pub assistant_text: String,
}

impl ConversationRecord {
    /// Create a record stamped with the current local time
    #[must_use]
    pub fn now(user_text: &str, assistant_text: &str) -> Self {
        Self {
            timestamp: Local::now(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
        }
    }

    /// Render the record as a log block
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "\n[{}]\n{USER_PREFIX}{}\n{ASSISTANT_PREFIX}{}\n{}\n",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.user_text,
            self.assistant_text,
            separator(),
        )
    }
}

fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Append-only log of conversation records
#[derive(Debug, Clone)]
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    /// Create a log writing to `path`
    ///
    /// Nothing is touched on disk until the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an exchange stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or written
    pub fn append(&self, user_text: &str, assistant_text: &str) -> Result<()> {
        self.append_record(&ConversationRecord::now(user_text, assistant_text))
    }

    /// Append a prepared record
    ///
    /// The block is written with a single `write_all` on a file opened in
    /// append mode, and the handle is closed before returning.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or written
    pub fn append_record(&self, record: &ConversationRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(record.render().as_bytes())?;
        file.flush()?;

        tracing::debug!(path = %self.path.display(), "conversation record appended");
        Ok(())
    }

    /// Read every record back from the log
    ///
    /// A missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read
    pub fn records(&self) -> Result<Vec<ConversationRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_records(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse log text into records, skipping malformed blocks
#[must_use]
pub fn parse_records(content: &str) -> Vec<ConversationRecord> {
    let closing = format!("\n{}\n", separator());

    content
        .split_inclusive(closing.as_str())
        .filter_map(|block| parse_block(block.strip_suffix(closing.as_str())?))
        .collect()
}

fn parse_block(block: &str) -> Option<ConversationRecord> {
    // Skip anything before the bracketed header (blank line, foreign text)
    let mut rest = block;
    let (timestamp, body) = loop {
        let (line, tail) = rest.split_once('\n')?;
        if let Some(timestamp) = parse_header(line) {
            break (timestamp, tail);
        }
        rest = tail;
    };

    let body = body.strip_prefix(USER_PREFIX)?;
    let (user_text, assistant_text) = body.split_once(&format!("\n{ASSISTANT_PREFIX}"))?;

    Some(ConversationRecord {
        timestamp,
        user_text: user_text.to_string(),
        assistant_text: assistant_text.to_string(),
    })
}

fn parse_header(line: &str) -> Option<DateTime<Local>> {
    let stamp = line.strip_prefix('[')?.strip_suffix(']')?;
    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}
