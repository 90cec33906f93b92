//! Database row types.

use chrono::{DateTime, Utc};

/// A single status check result stored in the database.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub id: i64,
    pub service_url: String,
    pub is_up: bool,
    pub checked_at: DateTime<Utc>,
    pub message: String,
}

/// A notification alert stored in the database.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub id: i64,
    pub service_url: String,
    pub alert_type: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// An interval during which a service was not up.
///
/// `ended_at` is None while the outage is ongoing; for any service there is
/// at most one such row.
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: i64,
    pub service_url: String,
    pub service_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl Incident {
    pub fn is_ongoing(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Duration of the incident, measured to `now` while ongoing.
    pub fn duration_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

/// Per-service persisted state snapshot.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub service_url: String,
    pub is_up: bool,
    pub last_checked: DateTime<Utc>,
    pub last_alert: Option<DateTime<Utc>>,
}
