//! Client for the proxy endpoints served by `coralclub-server`.
//!
//! Every call is a single JSON POST to `{base}/api/<endpoint>`; any non-2xx
//! answer is surfaced as [`KvError::Status`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{KvError, KvStore};
use crate::protocol::{
    KvGetRequest, KvGetResponse, KvIncrRequest, KvIncrResponse, KvMergeRequest, KvMergeResponse,
    KvSetRequest, KvSetResponse,
};

#[derive(Debug, Clone)]
pub struct ProxyKvClient {
    base_url: String,
    http: reqwest::Client,
}

impl ProxyKvClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, KvError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/api/{}", self.base_url, endpoint);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} answered {}: {}", endpoint, status, body);
            return Err(KvError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Runs the server-side merge of `patch` into the document at `state_key`.
    pub async fn merge(
        &self,
        state_key: &str,
        patch: Value,
        rev_key: &str,
    ) -> Result<KvMergeResponse, KvError> {
        let request = KvMergeRequest {
            state_key: state_key.to_string(),
            patch,
            rev_key: rev_key.to_string(),
        };
        self.call("kv-merge", &request).await
    }
}

#[async_trait]
impl KvStore for ProxyKvClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        let response: KvGetResponse = self
            .call(
                "kv-get",
                &KvGetRequest {
                    key: key.to_string(),
                },
            )
            .await?;
        Ok(response.value.filter(|v| !v.is_null()))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<bool, KvError> {
        let response: KvSetResponse = self
            .call(
                "kv-set",
                &KvSetRequest {
                    key: key.to_string(),
                    value: value.clone(),
                },
            )
            .await?;
        Ok(response.ok)
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let response: KvIncrResponse = self
            .call(
                "kv-incr",
                &KvIncrRequest {
                    key: key.to_string(),
                },
            )
            .await?;
        Ok(response.value)
    }
}
