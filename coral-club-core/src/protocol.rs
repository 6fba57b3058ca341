//! Wire types shared by the proxy server and its clients.
//!
//! Field names use camelCase to match the browser widget's requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::StateDocument;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvGetRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvGetResponse {
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvSetRequest {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvSetResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvIncrRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvIncrResponse {
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvMergeRequest {
    pub state_key: String,
    /// Raw patch; validated by the merge engine before use.
    #[serde(default)]
    pub patch: Value,
    pub rev_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvMergeResponse {
    pub ok: bool,
    pub rev: u64,
    pub state: StateDocument,
}

/// Envelope every upstream REST call answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamResult {
    #[serde(default)]
    pub result: Value,
}

/// Body of an upstream SET call.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamSetBody<'a> {
    pub value: &'a Value,
    pub nx: bool,
}
