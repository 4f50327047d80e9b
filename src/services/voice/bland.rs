use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::VoicePlatform;
use crate::models::VoiceCall;

pub struct BlandVoiceClient {
    api_key: String,
    api_url: String,
    pathway_id: String,
    voice: String,
    client: reqwest::Client,
}

impl BlandVoiceClient {
    pub fn new(api_key: String, api_url: String, pathway_id: String, voice: String) -> Self {
        Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            pathway_id,
            voice,
            client: reqwest::Client::new(),
        }
    }

    fn call_request(&self, phone_number: &str) -> serde_json::Value {
        let mut body = json!({
            "phone_number": phone_number,
            "voice": self.voice,
            "wait_for_greeting": false,
            "record": true,
            "answered_by_enabled": true,
            "noise_cancellation": false,
            "interruption_threshold": 100,
            "block_interruptions": false,
            "max_duration": 12,
            "model": "base",
            "language": "en",
            "background_track": "none",
            "voicemail_action": "hangup",
        });
        if !self.pathway_id.is_empty() {
            body["pathway_id"] = json!(self.pathway_id);
            body["pathway_version"] = json!(2);
        }
        body
    }
}

async fn read_json(resp: reqwest::Response, what: &str) -> anyhow::Result<serde_json::Value> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .with_context(|| format!("failed to read Bland AI {what} response"))?;
    if !status.is_success() {
        anyhow::bail!("Bland AI {what} failed ({status}): {text}");
    }
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&text).with_context(|| format!("failed to parse Bland AI {what} response"))
}

#[derive(Deserialize)]
struct CallList {
    #[serde(default)]
    calls: Vec<VoiceCall>,
}

#[async_trait]
impl VoicePlatform for BlandVoiceClient {
    async fn place_call(&self, phone_number: &str) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{}/v1/calls", self.api_url))
            .header("Authorization", &self.api_key)
            .json(&self.call_request(phone_number))
            .send()
            .await
            .context("failed to call Bland AI")?;
        read_json(resp, "call").await
    }

    async fn stop_call(&self, call_id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(format!(
                "{}/v1/calls/{}/stop",
                self.api_url,
                urlencoding::encode(call_id)
            ))
            .header("Authorization", &self.api_key)
            .send()
            .await
            .context("failed to call Bland AI")?;
        read_json(resp, "stop call").await?;
        Ok(())
    }

    async fn list_calls(&self) -> anyhow::Result<Vec<VoiceCall>> {
        let resp = self
            .client
            .get(format!("{}/v1/calls", self.api_url))
            .header("Authorization", &self.api_key)
            .send()
            .await
            .context("failed to call Bland AI")?;
        let data = read_json(resp, "list calls").await?;
        let list: CallList =
            serde_json::from_value(data).context("unexpected Bland AI call list shape")?;
        Ok(list.calls)
    }

    async fn get_call(&self, call_id: &str) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .get(format!(
                "{}/v1/calls/{}",
                self.api_url,
                urlencoding::encode(call_id)
            ))
            .header("Authorization", &self.api_key)
            .send()
            .await
            .context("failed to call Bland AI")?;
        read_json(resp, "call details").await
    }
}
