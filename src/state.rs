use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::CallEvent;
use crate::services::calendar::CalendarBackend;
use crate::services::registry::CallRegistry;
use crate::services::telephony::TelephonyCarrier;
use crate::services::voice::VoicePlatform;

pub struct AppState {
    pub config: AppConfig,
    pub calendar: Arc<dyn CalendarBackend>,
    pub voice: Box<dyn VoicePlatform>,
    pub telephony: Box<dyn TelephonyCarrier>,
    pub calls: CallRegistry,
    pub events_tx: broadcast::Sender<CallEvent>,
}
