use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use callbook::config::{AppConfig, CalendarBackendKind};
use callbook::handlers;
use callbook::models::parse_timezone;
use callbook::services::calendar::google::{GoogleCalendarStore, TokenSource};
use callbook::services::calendar::memory::InMemoryCalendar;
use callbook::services::calendar::CalendarBackend;
use callbook::services::events::EVENT_CHANNEL_CAPACITY;
use callbook::services::registry::CallRegistry;
use callbook::services::telephony::twilio::TwilioVoiceCarrier;
use callbook::services::voice::bland::BlandVoiceClient;
use callbook::state::AppState;

fn calendar_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn CalendarBackend>> {
    match config.calendar_backend {
        CalendarBackendKind::Memory => {
            tracing::warn!("using in-memory calendar, appointments are lost on restart");
            Ok(Arc::new(InMemoryCalendar::new()))
        }
        CalendarBackendKind::Google => {
            let tokens = if config.has_google_refresh_credentials() {
                tracing::info!("using Google Calendar with OAuth refresh token");
                TokenSource::refreshing(
                    config.google_client_id.clone(),
                    config.google_client_secret.clone(),
                    config.google_refresh_token.clone(),
                )
            } else {
                anyhow::ensure!(
                    !config.google_access_token.is_empty(),
                    "GOOGLE_ACCESS_TOKEN or GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET/GOOGLE_REFRESH_TOKEN must be set when CALENDAR_BACKEND=google"
                );
                tracing::info!("using Google Calendar with static access token");
                TokenSource::Static(config.google_access_token.clone())
            };
            Ok(Arc::new(GoogleCalendarStore::new(
                config.google_api_url.clone(),
                config.google_calendar_id.clone(),
                tokens,
            )))
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    parse_timezone(&config.default_timezone)
        .map_err(|e| anyhow::anyhow!("DEFAULT_TIMEZONE: {e}"))?;

    let calendar = calendar_backend(&config)?;

    if config.bland_api_key.is_empty() {
        tracing::warn!("BLAND_AI_API_KEY not set, voice platform calls will fail");
    }
    if config.bland_webhook_secret.is_empty() {
        tracing::warn!("BLAND_AI_WEBHOOK_SECRET not set, webhook signatures are not verified");
    }
    let voice = BlandVoiceClient::new(
        config.bland_api_key.clone(),
        config.bland_api_url.clone(),
        config.bland_pathway_id.clone(),
        config.bland_voice.clone(),
    );
    let telephony = TwilioVoiceCarrier::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_api_url.clone(),
    );

    let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let state = Arc::new(AppState {
        config: config.clone(),
        calendar,
        voice: Box::new(voice),
        telephony: Box::new(telephony),
        calls: CallRegistry::new(),
        events_tx,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/", get(handlers::dashboard::dashboard_page))
        .route("/inbound-calls", get(handlers::dashboard::inbound_calls_page))
        .route("/api/events", get(handlers::events::events_stream))
        .route("/calendar/v3/freeBusy", post(handlers::calendar::free_busy))
        .route("/calendar/v3/events", post(handlers::calendar::book_meeting))
        .route(
            "/calendar/v3/appointments/update",
            post(handlers::calendar::update_appointments),
        )
        .route(
            "/calendar/v3/appointments/delete",
            post(handlers::calendar::delete_appointments),
        )
        .route("/bland-ai/call", post(handlers::calls::place_call))
        .route(
            "/bland-ai/redirect_and_end_call",
            post(handlers::calls::redirect_and_end_call),
        )
        .route("/bland-ai/list_calls", get(handlers::calls::list_calls))
        .route("/bland-ai/webhook", post(handlers::webhook::bland_webhook))
        .route(
            "/bland-ai/transcript/:call_id",
            get(handlers::calls::get_transcript),
        )
        .route(
            "/twilio/message_and_hangup",
            post(handlers::twiml::message_and_hangup),
        )
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
