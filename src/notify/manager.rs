//! Notification state: edge detection, cooldowns, and fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{Alert, AlertKind, Notifier};
use crate::db::Store;

#[derive(Default)]
struct ManagerState {
    /// Last observed operational state per service identity.
    service_state: HashMap<String, bool>,
    /// Last successful notification time per service identity.
    last_alert: HashMap<String, DateTime<Utc>>,
}

/// Tracks per-service state and sends notifications on up/down edges,
/// subject to a per-service cooldown.
pub struct NotificationManager {
    notifiers: Vec<Notifier>,
    cooldown: Duration,
    storage: Option<Arc<Store>>,
    state: Mutex<ManagerState>,
}

impl NotificationManager {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            notifiers: Vec::new(),
            cooldown,
            storage: None,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// Attach a store so successful alerts are recorded durably.
    pub fn with_storage(mut self, storage: Arc<Store>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn add_notifier(&mut self, notifier: Notifier) {
        self.notifiers.push(notifier);
    }

    /// Observe one operational state and notify on an edge.
    ///
    /// Returns true only when at least one notifier accepted the alert.
    /// The whole observation is serialized per manager: concurrent callers
    /// queue on the state lock, so edge detection and the cooldown check
    /// never interleave.
    pub async fn check_and_notify(&self, service_url: &str, is_up: bool) -> bool {
        let mut state = self.state.lock().await;

        let prev = state.service_state.insert(service_url.to_string(), is_up);
        if prev == Some(is_up) {
            return false;
        }

        if let Some(last) = state.last_alert.get(service_url) {
            let within_cooldown = Utc::now()
                .signed_duration_since(*last)
                .to_std()
                .map(|since| since < self.cooldown)
                .unwrap_or(true);
            if within_cooldown {
                return false;
            }
        }

        let (kind, message) = if is_up {
            (
                AlertKind::Recovery,
                format!("Service recovered: {}", service_url),
            )
        } else {
            (AlertKind::Down, format!("Service down: {}", service_url))
        };

        let alert = Alert {
            service_url: service_url.to_string(),
            kind,
            message,
            timestamp: Utc::now(),
        };

        let mut sent = false;
        for notifier in &self.notifiers {
            match notifier.notify(&alert).await {
                Ok(()) => sent = true,
                Err(e) => {
                    tracing::error!(notifier = notifier.kind(), "notification error: {}", e);
                }
            }
        }

        if sent {
            let now = Utc::now();
            if let Some(storage) = &self.storage {
                if let Err(e) = storage.record_alert(&alert) {
                    tracing::error!("failed to record alert: {}", e);
                }
                if let Err(e) = storage.update_last_alert(service_url, now) {
                    tracing::error!("failed to update last alert time: {}", e);
                }
            }
            state.last_alert.insert(service_url.to_string(), now);
        }

        sent
    }

    /// Copy of the current per-service operational state.
    pub async fn service_states(&self) -> HashMap<String, bool> {
        self.state.lock().await.service_state.clone()
    }
}
