//! In-process key-value store.
//!
//! Used by tests and local runs. Each primitive can be switched to fail so
//! callers' fallback paths can be exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{value_as_i64, KvError, KvStore};

#[derive(Debug, Default)]
pub struct MemoryKv {
    values: RwLock<HashMap<String, Value>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_incr: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every GET fail with a transport error until reset.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_incrs(&self, fail: bool) {
        self.fail_incr.store(fail, Ordering::SeqCst);
    }

    /// Fails or restores all three primitives at once.
    pub fn set_offline(&self, offline: bool) {
        self.fail_gets(offline);
        self.fail_sets(offline);
        self.fail_incrs(offline);
    }

    /// Reads a key directly, bypassing failure injection.
    pub async fn peek(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), KvError> {
        if flag.load(Ordering::SeqCst) {
            Err(KvError::Transport(format!("{} unavailable", op)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        Self::check(&self.fail_get, "GET")?;
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<bool, KvError> {
        Self::check(&self.fail_set, "SET")?;
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(true)
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        Self::check(&self.fail_incr, "INCR")?;
        let mut values = self.values.write().await;
        let next = match values.get(key) {
            None => 1,
            Some(v) => value_as_i64(v)
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| KvError::InvalidResponse(format!("{} is not an integer", key)))?,
        };
        values.insert(key.to_string(), Value::from(next));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_incr_creates_at_one() {
        let kv = MemoryKv::new();
        assert_eq!(kv.incr("rev").await.unwrap(), 1);
        assert_eq!(kv.incr("rev").await.unwrap(), 2);
        assert_eq!(kv.get("rev").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let kv = MemoryKv::new();
        kv.set("doc", &json!({ "a": 1 })).await.unwrap();
        assert!(matches!(
            kv.incr("doc").await,
            Err(KvError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let kv = MemoryKv::new();
        kv.set("k", &json!("v")).await.unwrap();

        kv.set_offline(true);
        assert!(matches!(kv.get("k").await, Err(KvError::Transport(_))));
        assert!(kv.set("k", &json!("w")).await.is_err());
        assert_eq!(kv.peek("k").await, Some(json!("v")));

        kv.set_offline(false);
        assert_eq!(kv.get("k").await.unwrap(), Some(json!("v")));
    }
}
