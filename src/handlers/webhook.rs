use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::AppError;
use crate::services::events::publish_call_event;
use crate::state::AppState;

/// Checks `X-Bland-Signature`: hex HMAC-SHA256 of the raw request body.
pub fn verify_bland_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn str_field<'a>(payload: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    payload.get(name).and_then(|v| v.as_str())
}

/// True for the final delivery of a call (`"completed": true` or a terminal `status`).
pub fn is_call_finished(payload: &serde_json::Value) -> bool {
    if payload.get("completed").and_then(|v| v.as_bool()) == Some(true) {
        return true;
    }
    matches!(
        str_field(payload, "status").map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("completed" | "failed" | "canceled" | "cancelled" | "no-answer" | "busy")
    )
}

// POST /bland-ai/webhook
pub async fn bland_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    // Skip signature validation if no secret is configured (dev mode)
    if !state.config.bland_webhook_secret.is_empty() {
        let signature = headers
            .get("x-bland-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Bland-Signature header");
            return Err(AppError::Unauthorized(
                "X-Bland-Signature header missing".to_string(),
            ));
        }
        if !verify_bland_signature(&state.config.bland_webhook_secret, signature, &body) {
            tracing::warn!("invalid Bland webhook signature");
            return Err(AppError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::validation(format!("Invalid JSON payload: {e}")))?;
    if !payload.is_object() {
        return Err(AppError::validation("Invalid JSON payload"));
    }

    if let Some(call_id) = str_field(&payload, "call_id") {
        let sid = str_field(&payload, "sid");
        let from = str_field(&payload, "from");
        state.calls.observe(call_id, sid, from);
        tracing::info!(call_id, sid = ?sid, from = ?from, "call event received");
    } else {
        tracing::debug!("call event without call_id");
    }

    if let Some(call_id) = str_field(&payload, "call_id").filter(|_| is_call_finished(&payload)) {
        if state.calls.forget(call_id).is_some() {
            tracing::info!(call_id, "call finished, state dropped");
        }
    }

    publish_call_event(&state.events_tx, payload);

    Ok(Json(serde_json::json!({ "status": "success" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_bland_signature() {
        let body = br#"{"call_id":"c1"}"#;
        let signature = sign("whsec", body);
        assert!(verify_bland_signature("whsec", &signature, body));
        assert!(verify_bland_signature("whsec", &signature.to_uppercase(), body));
        assert!(!verify_bland_signature("other", &signature, body));
        assert!(!verify_bland_signature("whsec", &signature, br#"{"call_id":"c2"}"#));
        assert!(!verify_bland_signature("whsec", "zz-not-hex", body));
    }

    #[test]
    fn test_is_call_finished() {
        use serde_json::json;

        assert!(is_call_finished(&json!({ "call_id": "c1", "completed": true })));
        assert!(is_call_finished(&json!({ "call_id": "c1", "status": "completed" })));
        assert!(is_call_finished(&json!({ "call_id": "c1", "status": "No-Answer" })));
        assert!(!is_call_finished(&json!({ "call_id": "c1", "completed": false })));
        assert!(!is_call_finished(&json!({ "call_id": "c1", "status": "in-progress" })));
        assert!(!is_call_finished(&json!({ "call_id": "c1" })));
    }
}
