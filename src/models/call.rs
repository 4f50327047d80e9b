use serde::{Deserialize, Serialize};

/// Correlates a voice-platform call with the carrier leg that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallState {
    pub external_call_id: String,
    pub carrier_call_id: Option<String>,
    pub caller_number: Option<String>,
}

/// One entry of the voice platform's call listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceCall {
    pub call_id: Option<String>,
    #[serde(default)]
    pub inbound: Option<bool>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub queue_status: Option<String>,
    pub created_at: Option<String>,
    pub sid: Option<String>,
}

impl VoiceCall {
    pub fn is_inbound(&self) -> bool {
        self.inbound == Some(true)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InboundCallSummary {
    pub call_id: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub twilio_call_sid: Option<String>,
}

/// A call event relayed to dashboard subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct CallEvent {
    pub id: String,
    pub call_id: Option<String>,
    pub received_at: String,
    pub payload: serde_json::Value,
}
