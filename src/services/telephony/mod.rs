pub mod twilio;
pub mod twiml;

use async_trait::async_trait;

/// The carrier holding the actual phone leg of a call.
#[async_trait]
pub trait TelephonyCarrier: Send + Sync {
    /// Points a live call at new TwiML instructions.
    async fn redirect_call(&self, call_sid: &str, twiml_url: &str) -> anyhow::Result<()>;
}
