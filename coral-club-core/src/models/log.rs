use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in the audit trail.
pub const MAX_LOG_ENTRIES: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Returns `logs` with `entry` prepended, truncated from the tail.
pub fn push_log(logs: &[LogEntry], entry: LogEntry) -> Vec<LogEntry> {
    std::iter::once(entry)
        .chain(logs.iter().cloned())
        .take(MAX_LOG_ENTRIES)
        .collect()
}
