use tokio::sync::broadcast;

use crate::models::CallEvent;

pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fans a call event out to whoever is subscribed right now.
///
/// At-most-once: nothing is stored, a dashboard that is disconnected or lagging
/// simply misses the event.
pub fn publish_call_event(
    tx: &broadcast::Sender<CallEvent>,
    payload: serde_json::Value,
) -> CallEvent {
    let event = CallEvent {
        id: uuid::Uuid::new_v4().to_string(),
        call_id: payload
            .get("call_id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        received_at: chrono::Utc::now().to_rfc3339(),
        payload,
    };

    // Err only means there are no subscribers
    let receivers = tx.send(event.clone()).unwrap_or(0);
    tracing::debug!(event_id = %event.id, receivers, "published call event");
    event
}
