pub mod bland;

use async_trait::async_trait;

use crate::models::VoiceCall;

/// The conversational-voice platform that runs the calls.
#[async_trait]
pub trait VoicePlatform: Send + Sync {
    /// Places an outbound call and returns the platform's raw response.
    async fn place_call(&self, phone_number: &str) -> anyhow::Result<serde_json::Value>;

    async fn stop_call(&self, call_id: &str) -> anyhow::Result<()>;

    async fn list_calls(&self) -> anyhow::Result<Vec<VoiceCall>>;

    /// Full call details, including the transcript so far.
    async fn get_call(&self, call_id: &str) -> anyhow::Result<serde_json::Value>;
}
