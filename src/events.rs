use std::sync::{Arc, Mutex};

use log::warn;
use serde::Serialize;
use serde_json::Value;

pub const FEED_STATE_CHANGED: &str = "feed-state-changed";
pub const PLAYER_COMMAND: &str = "player-command";
pub const AUTH_CHANGED: &str = "auth-changed";

/// Outbound channel to whatever renders the client state. The desktop shell
/// forwards to the webview; tests record.
pub trait EventSink: Send + Sync + 'static {
    fn emit_value(&self, event: &str, payload: Value);
}

pub fn emit<S: EventSink + ?Sized, P: Serialize>(sink: &S, event: &str, payload: &P) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit_value(event, value),
        Err(err) => warn!("Failed to serialize {event} payload: {err}"),
    }
}

/// Keeps every emitted event in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(String, Value)> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn named(&self, event: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload)
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit_value(&self, event: &str, payload: Value) {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((event.to_string(), payload));
    }
}

#[cfg(feature = "desktop")]
mod desktop {
    use super::EventSink;
    use serde_json::Value;
    use tauri::{AppHandle, Emitter};

    impl EventSink for AppHandle {
        fn emit_value(&self, event: &str, payload: Value) {
            if let Err(err) = self.emit(event, payload) {
                log::error!("Failed to emit {event}: {err}");
            }
        }
    }
}
