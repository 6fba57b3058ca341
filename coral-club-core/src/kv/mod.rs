//! Key-value primitives.
//!
//! Everything the booking state needs from storage is three single-shot
//! calls: GET, SET and INCREMENT. None of them retry; any error means the
//! operation did not take effect and the caller decides what to do next.

mod memory;
mod proxy;
mod rest;

pub use memory::MemoryKv;
pub use proxy::ProxyKvClient;
pub use rest::RestKvClient;

use async_trait::async_trait;
use serde_json::Value;

/// Errors from a key-value call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KvError {
    /// The request never got a response (connection refused, timeout, ...).
    #[error("KV transport error: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("KV upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The service answered, but not in the expected shape.
    #[error("Invalid KV response: {0}")]
    InvalidResponse(String),
}

impl KvError {
    /// HTTP status to report when this error crosses the proxy boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            KvError::Status { status, .. } => *status,
            KvError::Transport(_) | KvError::InvalidResponse(_) => 502,
        }
    }
}

impl From<reqwest::Error> for KvError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            KvError::InvalidResponse(e.to_string())
        } else {
            KvError::Transport(e.to_string())
        }
    }
}

/// A remote key-value service.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError>;

    /// Stores `value` under `key`. Returns whether the store acknowledged it.
    async fn set(&self, key: &str, value: &Value) -> Result<bool, KvError>;

    /// Increments the integer under `key`, creating it at 1 when absent.
    async fn incr(&self, key: &str) -> Result<i64, KvError>;
}

/// Reads an integer the way the counter key may come back: a JSON number or
/// a numeric string.
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
