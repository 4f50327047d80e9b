use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{InboundCallSummary, VoiceCall};
use crate::services::registry::CallRegistry;
use crate::services::telephony::TelephonyCarrier;
use crate::services::voice::VoicePlatform;

const ACTIVE_QUEUE_STATUSES: &[&str] = &["started", "allocated", "queued", "new", "pending"];
const RECENTLY_COMPLETED_SECS: i64 = 300;

pub const DEFAULT_GOODBYE: &str = "Thank you for calling. Goodbye!";

fn is_listed(call: &VoiceCall, now: DateTime<Utc>) -> bool {
    if !call.is_inbound() {
        return false;
    }
    match call.queue_status.as_deref() {
        Some(status) if ACTIVE_QUEUE_STATUSES.contains(&status) => true,
        Some("completed") => call
            .created_at
            .as_deref()
            .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
            .map(|created| now - created.with_timezone(&Utc) < Duration::seconds(RECENTLY_COMPLETED_SECS))
            .unwrap_or(false),
        _ => false,
    }
}

/// Lists inbound calls that are live or finished within the last five minutes.
///
/// Also fills the registry: an inbound call whose carrier id is unknown gets its
/// details fetched so a later redirect can find the carrier leg. Completed calls
/// are dropped from the registry.
pub async fn list_inbound_calls(
    voice: &dyn VoicePlatform,
    registry: &CallRegistry,
    now: DateTime<Utc>,
) -> Result<Vec<InboundCallSummary>, AppError> {
    let calls = voice.list_calls().await.map_err(AppError::voice)?;

    let mut listed = Vec::new();
    for call in calls {
        let mut carrier_sid = call
            .call_id
            .as_deref()
            .and_then(|id| registry.carrier_call_id(id))
            .or_else(|| call.sid.clone());

        let finished = call.queue_status.as_deref() == Some("completed");
        if finished {
            // A finished call can no longer be redirected
            if let Some(call_id) = call.call_id.as_deref() {
                registry.forget(call_id);
            }
        } else if carrier_sid.is_none() && call.is_inbound() {
            if let Some(call_id) = call.call_id.as_deref() {
                let details = voice.get_call(call_id).await.map_err(AppError::voice)?;
                let sid = details.get("sid").and_then(|v| v.as_str());
                let from = details.get("from").and_then(|v| v.as_str());
                if let (Some(sid), Some(from)) = (sid, from) {
                    registry.observe(call_id, Some(sid), Some(from));
                    tracing::debug!(call_id, sid, "registered carrier leg from call details");
                }
                carrier_sid = sid.map(str::to_string);
            }
        }

        if is_listed(&call, now) {
            listed.push(InboundCallSummary {
                call_id: call.call_id,
                from_number: call.from,
                to_number: call.to,
                status: call.queue_status,
                created_at: call.created_at,
                twilio_call_sid: carrier_sid,
            });
        }
    }

    Ok(listed)
}

#[derive(Debug, Serialize)]
pub struct RedirectOutcome {
    pub voice_call_stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_stop_error: Option<String>,
    pub redirect_url: String,
}

/// Ends the voice-platform side of a call and sends the carrier leg to a
/// goodbye message followed by a hangup.
///
/// Failing to stop the voice call is tolerated; the carrier redirect is what
/// actually ends the call, so its failure is an error.
pub async fn redirect_and_end(
    voice: &dyn VoicePlatform,
    carrier: &dyn TelephonyCarrier,
    registry: &CallRegistry,
    call_id: &str,
    message: &str,
    base_url: &str,
) -> Result<RedirectOutcome, AppError> {
    let state = registry.lookup(call_id).ok_or_else(|| {
        AppError::NotFound("No active call found for the given Bland AI Call ID.".to_string())
    })?;
    let carrier_sid = state.carrier_call_id.ok_or_else(|| {
        AppError::validation(
            "Twilio CallSid not found for this Bland AI Call ID. Cannot redirect or end Twilio leg.",
        )
    })?;

    let voice_stop_error = match voice.stop_call(call_id).await {
        Ok(()) => {
            tracing::info!(call_id, "voice call stopped");
            None
        }
        Err(e) => {
            tracing::warn!(call_id, error = %e, "failed to stop voice call");
            Some(format!("{e:#}"))
        }
    };

    let redirect_url = format!(
        "{}/twilio/message_and_hangup?message={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(message)
    );
    carrier
        .redirect_call(&carrier_sid, &redirect_url)
        .await
        .map_err(AppError::telephony)?;

    registry.forget(call_id);

    Ok(RedirectOutcome {
        voice_call_stopped: voice_stop_error.is_none(),
        voice_stop_error,
        redirect_url,
    })
}
