//! The revision clock: a counter key bumped once per committed merge.
//!
//! Readers compare it with the last value they saw to decide whether to
//! re-fetch the document. It says nothing about which revision a fetched
//! document actually reflects.

use std::sync::Arc;

use serde_json::Value;

use crate::kv::{value_as_i64, KvError, KvStore};

#[derive(Clone)]
pub struct RevisionClock {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl RevisionClock {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current counter value, 0 when the key does not exist yet.
    pub async fn current(&self) -> Result<u64, KvError> {
        match self.kv.get(&self.key).await? {
            None => Ok(0),
            Some(value) => to_revision(&value),
        }
    }

    /// Increments the counter and returns the new value.
    pub async fn advance(&self) -> Result<u64, KvError> {
        let next = self.kv.incr(&self.key).await?;
        to_revision(&Value::from(next))
    }

    /// Overwrites the counter. Only used when seeding a fresh deployment.
    pub async fn reset(&self, rev: u64) -> Result<(), KvError> {
        if self.kv.set(&self.key, &Value::from(rev)).await? {
            Ok(())
        } else {
            Err(KvError::InvalidResponse(format!(
                "SET {} was not acknowledged",
                self.key
            )))
        }
    }
}

fn to_revision(value: &Value) -> Result<u64, KvError> {
    value_as_i64(value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| KvError::InvalidResponse(format!("revision is not a counter: {}", value)))
}
