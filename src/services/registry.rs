use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::models::CallState;

/// How long an entry survives without a new observation.
pub const DEFAULT_CALL_STATE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

struct Entry {
    state: CallState,
    last_seen: Instant,
}

/// In-memory map from voice-platform call id to the carrier leg and caller.
///
/// Filled by webhook deliveries and call-list polling, drained when a call is
/// redirected or completes. Entries idle for longer than the TTL are swept on
/// the next observation. Nothing survives a restart. The lock is only held for
/// single map operations.
pub struct CallRegistry {
    calls: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_CALL_STATE_TTL)
    }
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Upserts an observation. A missing field in a later observation does not
    /// erase one an earlier source already supplied.
    pub fn observe(
        &self,
        external_call_id: &str,
        carrier_call_id: Option<&str>,
        caller_number: Option<&str>,
    ) {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

        let before = calls.len();
        calls.retain(|_, e| now.saturating_duration_since(e.last_seen) < self.ttl);
        let expired = before - calls.len();
        if expired > 0 {
            tracing::debug!(expired, "swept idle call state");
        }

        let entry = calls
            .entry(external_call_id.to_string())
            .or_insert_with(|| Entry {
                state: CallState {
                    external_call_id: external_call_id.to_string(),
                    carrier_call_id: None,
                    caller_number: None,
                },
                last_seen: now,
            });
        entry.last_seen = now;
        if let Some(sid) = carrier_call_id.filter(|s| !s.is_empty()) {
            entry.state.carrier_call_id = Some(sid.to_string());
        }
        if let Some(number) = caller_number.filter(|s| !s.is_empty()) {
            entry.state.caller_number = Some(number.to_string());
        }
    }

    pub fn lookup(&self, external_call_id: &str) -> Option<CallState> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(external_call_id)
            .map(|e| e.state.clone())
    }

    pub fn carrier_call_id(&self, external_call_id: &str) -> Option<String> {
        self.lookup(external_call_id)
            .and_then(|state| state.carrier_call_id)
    }

    pub fn forget(&self, external_call_id: &str) -> Option<CallState> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(external_call_id)
            .map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_observe_lookup_forget() {
        let registry = CallRegistry::new();
        assert!(registry.lookup("call-1").is_none());

        registry.observe("call-1", Some("CA123"), Some("+15550001111"));
        let state = registry.lookup("call-1").unwrap();
        assert_eq!(state.carrier_call_id.as_deref(), Some("CA123"));
        assert_eq!(state.caller_number.as_deref(), Some("+15550001111"));
        assert_eq!(registry.len(), 1);

        assert!(registry.forget("call-1").is_some());
        assert!(registry.lookup("call-1").is_none());
        assert!(registry.is_empty());
        assert!(registry.forget("call-1").is_none());
    }

    #[test]
    fn test_last_write_wins_but_keeps_known_fields() {
        let registry = CallRegistry::new();
        registry.observe("call-1", Some("CA123"), None);
        registry.observe("call-1", None, Some("+15550001111"));
        registry.observe("call-1", Some("CA999"), Some(""));

        let state = registry.lookup("call-1").unwrap();
        assert_eq!(state.carrier_call_id.as_deref(), Some("CA999"));
        assert_eq!(state.caller_number.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn test_idle_entries_are_swept_on_next_observation() {
        let registry = CallRegistry::with_ttl(Duration::from_millis(20));
        registry.observe("old", Some("CA1"), None);
        std::thread::sleep(Duration::from_millis(40));

        // Still there until something new arrives
        assert!(registry.lookup("old").is_some());

        registry.observe("new", Some("CA2"), None);
        assert!(registry.lookup("old").is_none());
        assert_eq!(registry.carrier_call_id("new").as_deref(), Some("CA2"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reobservation_keeps_entry_alive() {
        let registry = CallRegistry::with_ttl(Duration::from_millis(60));
        registry.observe("call-1", Some("CA1"), None);
        std::thread::sleep(Duration::from_millis(35));
        registry.observe("call-1", None, None);
        std::thread::sleep(Duration::from_millis(35));
        registry.observe("call-2", None, None);
        assert_eq!(registry.carrier_call_id("call-1").as_deref(), Some("CA1"));
    }

    #[test]
    fn test_concurrent_observers() {
        let registry = Arc::new(CallRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.observe(&format!("call-{}", j % 10), Some(&format!("CA{i}")), None);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 10);
        assert!(registry.carrier_call_id("call-3").unwrap().starts_with("CA"));
    }
}
