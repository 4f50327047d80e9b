use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::handlers::calls::base_url;
use crate::services::telephony::twiml::{say_and_hangup, validate_twilio_signature, DEFAULT_HANGUP_MESSAGE};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HangupQuery {
    pub message: Option<String>,
}

// POST /twilio/message_and_hangup
pub async fn message_and_hangup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HangupQuery>,
    uri: Uri,
    headers: HeaderMap,
    form: Option<Form<Vec<(String, String)>>>,
) -> Response {
    let params = form.map(|Form(p)| p).unwrap_or_default();

    // Validate Twilio signature when an auth token is configured
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{}{}", base_url(&state.config, &headers), path_and_query);

        if signature.is_empty()
            || !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params)
        {
            tracing::warn!(url = %url, "invalid or missing Twilio signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let message = query
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HANGUP_MESSAGE.to_string());
    tracing::info!(message = %message, "serving hangup TwiML");

    (
        [(header::CONTENT_TYPE, "text/xml")],
        say_and_hangup(&message),
    )
        .into_response()
}
