use std::env;

pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_MAX_WINDOW_DAYS: i64 = 31;

#[derive(Clone, Debug, PartialEq)]
pub enum CalendarBackendKind {
    Google,
    Memory,
}

impl CalendarBackendKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "memory" => CalendarBackendKind::Memory,
            _ => CalendarBackendKind::Google,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub default_timezone: String,
    pub allowed_origins: Vec<String>,
    pub public_base_url: Option<String>,
    pub slot_suggestions: usize,
    /// Widest freeBusy search window accepted, in days.
    pub max_window_days: i64,
    pub dashboard_token: String,
    pub calendar_backend: CalendarBackendKind,
    pub google_calendar_id: String,
    pub google_api_url: String,
    pub google_access_token: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,
    pub bland_api_key: String,
    pub bland_webhook_secret: String,
    pub bland_api_url: String,
    pub bland_pathway_id: String,
    pub bland_voice: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            default_timezone: env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_else(|_| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://localhost:8000".to_string(),
                    ]
                }),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty()),
            slot_suggestions: env::var("SLOT_SUGGESTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
            max_window_days: env::var("MAX_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_WINDOW_DAYS),
            dashboard_token: env::var("DASHBOARD_TOKEN").unwrap_or_default(),
            calendar_backend: CalendarBackendKind::parse(
                &env::var("CALENDAR_BACKEND").unwrap_or_default(),
            ),
            google_calendar_id: env::var("GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|_| "primary".to_string()),
            google_api_url: env::var("GOOGLE_CALENDAR_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
            google_access_token: env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default(),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_refresh_token: env::var("GOOGLE_REFRESH_TOKEN").unwrap_or_default(),
            bland_api_key: env::var("BLAND_AI_API_KEY").unwrap_or_default(),
            bland_webhook_secret: env::var("BLAND_AI_WEBHOOK_SECRET").unwrap_or_default(),
            bland_api_url: env::var("BLAND_AI_API_URL")
                .unwrap_or_else(|_| "https://api.bland.ai".to_string()),
            bland_pathway_id: env::var("BLAND_AI_PATHWAY_ID").unwrap_or_default(),
            bland_voice: env::var("BLAND_AI_VOICE").unwrap_or_else(|_| "June".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_api_url: env::var("TWILIO_API_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
        }
    }

    pub fn has_google_refresh_credentials(&self) -> bool {
        !self.google_client_id.is_empty()
            && !self.google_client_secret.is_empty()
            && !self.google_refresh_token.is_empty()
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
