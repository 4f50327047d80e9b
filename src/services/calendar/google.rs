use std::time::{Duration as StdDuration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::{AppointmentStore, BusyIntervalSource};
use crate::models::{Appointment, AppointmentDraft, BusyPeriod};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PAGE_SIZE: &str = "250";
const CONTACT_SCAN_DAYS: i64 = 365;
const TOKEN_EXPIRY_MARGIN: StdDuration = StdDuration::from_secs(60);

/// Where access tokens come from: a fixed token, or an OAuth refresh-token grant
/// cached until shortly before it expires.
pub enum TokenSource {
    Static(String),
    Refreshing {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

pub struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl TokenSource {
    pub fn refreshing(client_id: String, client_secret: String, refresh_token: String) -> Self {
        TokenSource::Refreshing {
            client_id,
            client_secret,
            refresh_token,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn access_token(&self, client: &reqwest::Client) -> anyhow::Result<String> {
        let (client_id, client_secret, refresh_token, token_url, cached) = match self {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Refreshing {
                client_id,
                client_secret,
                refresh_token,
                token_url,
                cached,
            } => (client_id, client_secret, refresh_token, token_url, cached),
        };

        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let resp = client
            .post(token_url)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("token refresh request failed")?;
        let resp = ensure_success(resp, "token refresh").await?;
        let token: TokenResponse = resp
            .json()
            .await
            .context("failed to parse token response")?;

        tracing::debug!(expires_in = token.expires_in, "refreshed Google access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + StdDuration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

pub struct GoogleCalendarStore {
    api_url: String,
    calendar_id: String,
    tokens: TokenSource,
    client: reqwest::Client,
}

impl GoogleCalendarStore {
    pub fn new(api_url: String, calendar_id: String, tokens: TokenSource) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            calendar_id,
            tokens,
            client: reqwest::Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(id))
    }

    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> anyhow::Result<Vec<GoogleEvent>> {
        let token = self.tokens.access_token(&self.client).await?;
        let time_min = time_min.to_rfc3339();
        let time_max = time_max.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(t) = page_token.as_deref() {
                query.push(("pageToken", t));
            }

            let resp = self
                .client
                .get(self.events_url())
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await
                .context("Google Calendar list request failed")?;
            let page: EventsPage = ensure_success(resp, "list events")
                .await?
                .json()
                .await
                .context("failed to parse Google Calendar events")?;

            events.extend(page.items);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(events)
    }
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("Google {what} failed ({status}): {body}")
}

fn event_body(draft: &AppointmentDraft) -> serde_json::Value {
    let tz = draft.interval.start().timezone();
    let mut body = json!({
        "summary": draft.title,
        "start": {
            "dateTime": draft.interval.start().with_timezone(&Utc).to_rfc3339(),
            "timeZone": tz.name(),
        },
        "end": {
            "dateTime": draft.interval.end().with_timezone(&Utc).to_rfc3339(),
            "timeZone": tz.name(),
        },
        "reminders": { "useDefault": true },
    });
    if let Some(description) = &draft.description {
        body["description"] = json!(description);
    }
    body
}

#[derive(Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

/// All-day events only carry `date`, which is ignored.
#[derive(Deserialize, Default)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

impl EventTime {
    fn parse(&self, event_id: &str) -> Option<DateTime<FixedOffset>> {
        let raw = self.date_time.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Some(dt),
            Err(e) => {
                tracing::warn!(event_id, raw, error = %e, "unparseable event time");
                None
            }
        }
    }
}

impl From<GoogleEvent> for Appointment {
    fn from(e: GoogleEvent) -> Self {
        let start = e.start.parse(&e.id);
        let end = e.end.parse(&e.id);
        Appointment {
            id: e.id,
            title: e.summary.unwrap_or_default(),
            description: e.description,
            start,
            end,
            link: e.html_link,
        }
    }
}

#[async_trait]
impl BusyIntervalSource for GoogleCalendarStore {
    async fn list_busy(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        let events = self.list_events(window_start, window_end).await?;
        Ok(events
            .into_iter()
            .map(Appointment::from)
            .filter_map(|a| Some(BusyPeriod::new(a.start?, a.end?)))
            .collect())
    }
}

#[async_trait]
impl AppointmentStore for GoogleCalendarStore {
    async fn create(&self, draft: &AppointmentDraft) -> anyhow::Result<String> {
        let token = self.tokens.access_token(&self.client).await?;
        let resp = self
            .client
            .post(self.events_url())
            .bearer_auth(&token)
            .json(&event_body(draft))
            .send()
            .await
            .context("Google Calendar insert request failed")?;
        let created: GoogleEvent = ensure_success(resp, "insert event")
            .await?
            .json()
            .await
            .context("failed to parse created event")?;

        Ok(created.html_link.unwrap_or(created.id))
    }

    async fn update(&self, id: &str, draft: &AppointmentDraft) -> anyhow::Result<()> {
        let token = self.tokens.access_token(&self.client).await?;
        let resp = self
            .client
            .put(self.event_url(id))
            .bearer_auth(&token)
            .json(&event_body(draft))
            .send()
            .await
            .context("Google Calendar update request failed")?;
        ensure_success(resp, "update event").await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let token = self.tokens.access_token(&self.client).await?;
        let resp = self
            .client
            .delete(self.event_url(id))
            .bearer_auth(&token)
            .send()
            .await
            .context("Google Calendar delete request failed")?;
        ensure_success(resp, "delete event").await?;
        Ok(())
    }

    async fn find_by_contact_key(&self, contact_key: &str) -> anyhow::Result<Vec<Appointment>> {
        let now = Utc::now();
        let span = Duration::days(CONTACT_SCAN_DAYS);
        let events = self.list_events(now - span, now + span).await?;
        Ok(events
            .into_iter()
            .map(Appointment::from)
            .filter(|a| a.is_tagged_with(contact_key))
            .collect())
    }
}
