//! Client for the upstream key-value REST service.
//!
//! ```text
//! GET  {url}/get/{key}   -> { "result": value | null }
//! POST {url}/set/{key}   <- { "value": v, "nx": false }  -> { "result": "OK" }
//! POST {url}/incr/{key}  -> { "result": n }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use super::{value_as_i64, KvError, KvStore};
use crate::protocol::{UpstreamResult, UpstreamSetBody};

#[derive(Debug, Clone)]
pub struct RestKvClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl RestKvClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, op: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, op, urlencoding::encode(key))
    }

    async fn read_result(response: reqwest::Response) -> Result<Value, KvError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KvError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: UpstreamResult = response.json().await?;
        Ok(envelope.result)
    }
}

/// Values come back either as JSON or as the JSON text they were stored as.
fn decode_stored(result: Value) -> Option<Value> {
    match result {
        Value::Null => None,
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => Some(parsed),
            Err(_) => Some(Value::String(s)),
        },
        other => Some(other),
    }
}

#[async_trait]
impl KvStore for RestKvClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        let response = self
            .http
            .get(self.url("get", key))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let result = Self::read_result(response).await?;
        Ok(decode_stored(result))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<bool, KvError> {
        let response = self
            .http
            .post(self.url("set", key))
            .bearer_auth(&self.token)
            .json(&UpstreamSetBody { value, nx: false })
            .send()
            .await?;

        let result = Self::read_result(response).await?;
        Ok(result.as_str() == Some("OK"))
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let response = self
            .http
            .post(self.url("incr", key))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let result = Self::read_result(response).await?;
        value_as_i64(&result)
            .ok_or_else(|| KvError::InvalidResponse(format!("expected integer, got {}", result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/state"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "rev": 3, "tents": [] }
            })))
            .mount(&server)
            .await;

        let client = RestKvClient::new(server.uri(), "secret");
        let value = client.get("state").await.unwrap().unwrap();
        assert_eq!(value["rev"], 3);
    }

    #[tokio::test]
    async fn test_get_decodes_json_text_and_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get/as-text"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": "{\"rev\":9}" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get/missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": null })))
            .mount(&server)
            .await;

        let client = RestKvClient::new(server.uri(), "t");
        assert_eq!(client.get("as-text").await.unwrap(), Some(json!({ "rev": 9 })));
        assert_eq!(client.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_sends_value_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/set/k"))
            .and(body_json(json!({ "value": { "a": 1 }, "nx": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "OK" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestKvClient::new(format!("{}/", server.uri()), "t");
        assert!(client.set("k", &json!({ "a": 1 })).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_and_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/incr/rev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/incr/locked"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = RestKvClient::new(server.uri(), "t");
        assert_eq!(client.incr("rev").await.unwrap(), 42);

        let err = client.incr("locked").await.unwrap_err();
        assert_eq!(
            err,
            KvError::Status {
                status: 403,
                body: "forbidden".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let client = RestKvClient::new("http://127.0.0.1:1", "t");
        let err = client.get("k").await.unwrap_err();
        assert!(matches!(err, KvError::Transport(_)));
    }
}
