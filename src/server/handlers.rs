//! The four proxy endpoints.
//!
//! Bodies are parsed from raw bytes. A malformed request is a 400 whatever
//! its content type.

use axum::{body::Bytes, extract::State, Json};
use coral_club_core::merge::{MergeEngine, Patch, StateKeys};
use coral_club_core::protocol::{
    KvGetRequest, KvGetResponse, KvIncrRequest, KvIncrResponse, KvMergeRequest, KvMergeResponse,
    KvSetRequest, KvSetResponse,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::AppState;

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {}", e)))
}

fn require_key(name: &str, key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        Err(ApiError::BadRequest(format!("{} must not be empty", name)))
    } else {
        Ok(())
    }
}

pub async fn kv_get(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<KvGetResponse>, ApiError> {
    let req: KvGetRequest = parse(&body)?;
    require_key("key", &req.key)?;

    let value = state.kv.get(&req.key).await?;
    Ok(Json(KvGetResponse { value }))
}

pub async fn kv_set(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<KvSetResponse>, ApiError> {
    let req: KvSetRequest = parse(&body)?;
    require_key("key", &req.key)?;

    let ok = state.kv.set(&req.key, &req.value).await?;
    Ok(Json(KvSetResponse { ok }))
}

pub async fn kv_incr(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<KvIncrResponse>, ApiError> {
    let req: KvIncrRequest = parse(&body)?;
    require_key("key", &req.key)?;

    let value = state.kv.incr(&req.key).await?;
    Ok(Json(KvIncrResponse { value }))
}

pub async fn kv_merge(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<KvMergeResponse>, ApiError> {
    let req: KvMergeRequest = parse(&body)?;
    require_key("stateKey", &req.state_key)?;
    require_key("revKey", &req.rev_key)?;

    // A missing or null patch is an empty one.
    let patch = if req.patch.is_null() {
        Patch::new()
    } else {
        Patch::from_value(req.patch)?
    };

    let engine = MergeEngine::new(state.kv.clone(), StateKeys::new(req.state_key, req.rev_key));
    let outcome = engine.merge(&patch).await?;

    Ok(Json(KvMergeResponse {
        ok: true,
        rev: outcome.rev,
        state: outcome.state,
    }))
}
