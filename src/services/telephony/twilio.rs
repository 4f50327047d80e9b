use anyhow::Context;
use async_trait::async_trait;

use super::TelephonyCarrier;

pub struct TwilioVoiceCarrier {
    account_sid: String,
    auth_token: String,
    api_url: String,
    client: reqwest::Client,
}

impl TwilioVoiceCarrier {
    pub fn new(account_sid: String, auth_token: String, api_url: String) -> Self {
        Self {
            account_sid,
            auth_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TelephonyCarrier for TwilioVoiceCarrier {
    async fn redirect_call(&self, call_sid: &str, twiml_url: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_url, self.account_sid, call_sid
        );

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Url", twiml_url), ("Method", "POST")])
            .send()
            .await
            .context("failed to redirect Twilio call")?
            .error_for_status()
            .context("Twilio API returned error")?;

        tracing::info!(call_sid, twiml_url, "redirected carrier call");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_redirect_posts_twiml_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC1/Calls/CA123.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Method=POST"))
            .and(body_string_contains("Url=https%3A%2F%2Fexample.com%2Ftwilio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sid": "CA123"})))
            .expect(1)
            .mount(&server)
            .await;

        let carrier = TwilioVoiceCarrier::new("AC1".to_string(), "token".to_string(), server.uri());
        carrier
            .redirect_call("CA123", "https://example.com/twilio/message_and_hangup")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_redirect_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let carrier = TwilioVoiceCarrier::new("AC1".to_string(), "token".to_string(), server.uri());
        assert!(carrier.redirect_call("CA404", "https://example.com").await.is_err());
    }
}
