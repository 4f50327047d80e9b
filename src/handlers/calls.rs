use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::InboundCallSummary;
use crate::services::calls::{self, RedirectOutcome, DEFAULT_GOODBYE};
use crate::state::AppState;

/// The externally reachable base URL, used to build TwiML callbacks.
///
/// `PUBLIC_BASE_URL` wins; otherwise it is reconstructed from proxy headers
/// the same way the carrier will see it.
pub fn base_url(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(url) = config.public_base_url.as_deref().filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{proto}://{host}")
}

// POST /bland-ai/call
#[derive(Deserialize)]
pub struct PlaceCallRequest {
    pub phone_number: Option<String>,
}

pub async fn place_call(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PlaceCallRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(req) = payload?;
    let phone_number = req
        .phone_number
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("Phone number is required."))?;

    let response = state
        .voice
        .place_call(&phone_number)
        .await
        .map_err(AppError::voice)?;
    tracing::info!(to = %phone_number, call_id = ?response.get("call_id"), "outbound call placed");

    Ok(Json(response))
}

// POST /bland-ai/redirect_and_end_call
#[derive(Deserialize)]
pub struct RedirectRequest {
    pub bland_ai_call_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct RedirectResponse {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: RedirectOutcome,
}

pub async fn redirect_and_end_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RedirectRequest>, JsonRejection>,
) -> Result<Json<RedirectResponse>, AppError> {
    let Json(req) = payload?;
    let call_id = req
        .bland_ai_call_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::validation("Bland AI Call ID is required."))?;
    let message = req.message.unwrap_or_else(|| DEFAULT_GOODBYE.to_string());

    let outcome = calls::redirect_and_end(
        state.voice.as_ref(),
        state.telephony.as_ref(),
        &state.calls,
        &call_id,
        &message,
        &base_url(&state.config, &headers),
    )
    .await?;

    Ok(Json(RedirectResponse {
        status: "success",
        message: "Call redirected and termination attempted.",
        outcome,
    }))
}

// GET /bland-ai/list_calls
#[derive(Serialize)]
pub struct ListCallsResponse {
    pub active_inbound_calls: Vec<InboundCallSummary>,
}

pub async fn list_calls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListCallsResponse>, AppError> {
    let active_inbound_calls =
        calls::list_inbound_calls(state.voice.as_ref(), &state.calls, chrono::Utc::now()).await?;
    Ok(Json(ListCallsResponse {
        active_inbound_calls,
    }))
}

// GET /bland-ai/transcript/:call_id
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let details = state
        .voice
        .get_call(&call_id)
        .await
        .map_err(AppError::voice)?;
    Ok(Json(details))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_base_url: Option<&str>) -> AppConfig {
        let mut config = AppConfig::from_env();
        config.public_base_url = public_base_url.map(str::to_string);
        config
    }

    #[test]
    fn test_base_url_prefers_configured_value() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "internal:8000".parse().unwrap());
        assert_eq!(
            base_url(&config(Some("https://calls.example.com/")), &headers),
            "https://calls.example.com"
        );
    }

    #[test]
    fn test_base_url_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "abc.ngrok-free.app".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(base_url(&config(None), &headers), "https://abc.ngrok-free.app");

        headers.remove("x-forwarded-proto");
        assert_eq!(base_url(&config(None), &headers), "http://abc.ngrok-free.app");
    }
}
