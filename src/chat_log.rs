//! Append-only JSON Lines store of past exchanges.
//!
//! One [`ConversationEntry`] per line, UTF-8, in chronological order. The
//! file is created once and only ever appended to. When an append fails
//! the entry is dumped to a plain-text backup file instead.

use chrono::{Local, SecondsFormat};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::LogConfig;
use crate::error::LogError;
use crate::models::{ConversationEntry, Role};

/// Current local time as an ISO-8601 timestamp with offset.
pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[derive(Debug, Clone)]
pub struct ChatLog {
    path: PathBuf,
    backup_path: PathBuf,
}

impl ChatLog {
    pub fn new(path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_path: backup_path.into(),
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(&config.path, &config.backup_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Create the log file (and its parent directory) if absent.
    pub fn ensure_exists(&self) -> Result<(), LogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_err(source))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_err(source))?;
        Ok(())
    }

    /// Read every entry in file order, skipping malformed lines.
    ///
    /// Never fails: an unreadable file is reported and treated as empty.
    pub fn load_all(&self) -> Vec<ConversationEntry> {
        match self.try_load_all() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to load chat log");
                Vec::new()
            }
        }
    }

    /// Read every entry in file order. Malformed lines, including ones
    /// that are not valid UTF-8, are skipped; only I/O failures are
    /// returned. A missing file reads as empty.
    pub fn try_load_all(&self) -> Result<Vec<ConversationEntry>, LogError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_err(source)),
        };

        let mut entries = Vec::new();
        for (index, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let raw = raw.map_err(|source| self.io_err(source))?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let parsed = std::str::from_utf8(&raw)
                .map_err(|e| LogError::Malformed(e.to_string()))
                .and_then(parse_line);
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "skipping chat log line");
                }
            }
        }

        Ok(entries)
    }

    /// Append one entry as a single line.
    ///
    /// On failure a best-effort plain-text record is written to the backup
    /// file and the original error is returned.
    pub fn append(&self, entry: &ConversationEntry) -> Result<(), LogError> {
        match self.write_line(entry) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "chat log append failed");
                self.write_backup(entry);
                Err(e)
            }
        }
    }

    fn write_line(&self, entry: &ConversationEntry) -> Result<(), LogError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_err(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_err(source))
    }

    fn write_backup(&self, entry: &ConversationEntry) {
        let record = format!("[{}] Backup: {:?}\n", Local::now(), entry.conversation);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.backup_path)
            .and_then(|mut f| f.write_all(record.as_bytes()));

        if let Err(e) = result {
            tracing::error!(path = %self.backup_path.display(), error = %e, "backup write failed");
        }
    }

    fn io_err(&self, source: std::io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse and validate one log line.
///
/// Requires a string `timestamp` and a `conversation` of user/assistant
/// turns with string contents.
pub fn parse_line(line: &str) -> Result<ConversationEntry, LogError> {
    let entry: ConversationEntry =
        serde_json::from_str(line).map_err(|e| LogError::Malformed(e.to_string()))?;

    if entry.conversation.iter().any(|t| t.role == Role::System) {
        return Err(LogError::Malformed(
            "system turn in persisted conversation".to_string(),
        ));
    }

    Ok(entry)
}
