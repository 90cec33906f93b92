//! SQLite store implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use thiserror::Error;

use super::models::{AlertRecord, Incident, ServiceState, StatusRecord};
use crate::notify::Alert;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Thread-safe persistent store.
///
/// Service state and incident rows are mutated only through
/// [`Store::record_transition`], which keeps the pair consistent.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    /// Opening an existing database is a no-op on the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS status_checks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 service_url TEXT NOT NULL,
                 is_up INTEGER NOT NULL,
                 checked_at DATETIME NOT NULL,
                 message TEXT
             );

             CREATE INDEX IF NOT EXISTS idx_status_checks_service_url ON status_checks(service_url);
             CREATE INDEX IF NOT EXISTS idx_status_checks_checked_at ON status_checks(checked_at);

             CREATE TABLE IF NOT EXISTS alerts (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 service_url TEXT NOT NULL,
                 alert_type TEXT NOT NULL,
                 message TEXT,
                 sent_at DATETIME NOT NULL
             );

             CREATE INDEX IF NOT EXISTS idx_alerts_service_url ON alerts(service_url);
             CREATE INDEX IF NOT EXISTS idx_alerts_sent_at ON alerts(sent_at);

             CREATE TABLE IF NOT EXISTS incidents (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 service_url TEXT NOT NULL,
                 service_name TEXT NOT NULL,
                 started_at DATETIME NOT NULL,
                 ended_at DATETIME,
                 message TEXT
             );

             CREATE INDEX IF NOT EXISTS idx_incidents_service_url ON incidents(service_url);
             CREATE INDEX IF NOT EXISTS idx_incidents_ended_at ON incidents(ended_at);

             CREATE TABLE IF NOT EXISTS service_state (
                 service_url TEXT PRIMARY KEY,
                 is_up INTEGER NOT NULL,
                 last_checked DATETIME NOT NULL,
                 last_alert DATETIME
             );",
        )?;
        Ok(())
    }

    // --- Status checks ---

    /// Append one probe result to the audit log.
    pub fn record_status(
        &self,
        service_url: &str,
        is_up: bool,
        message: &str,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO status_checks (service_url, is_up, checked_at, message) VALUES (?1, ?2, ?3, ?4)",
            params![service_url, is_up as i64, fmt_time(Utc::now()), message],
        )?;
        Ok(())
    }

    /// Most recent status for a service, if any.
    pub fn last_status(&self, service_url: &str) -> Result<Option<StatusRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, service_url, is_up, checked_at, message FROM status_checks
                 WHERE service_url = ?1 ORDER BY checked_at DESC, id DESC LIMIT 1",
                params![service_url],
                status_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Recent status history for a service, newest first.
    pub fn status_history(
        &self,
        service_url: &str,
        limit: usize,
    ) -> Result<Vec<StatusRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, service_url, is_up, checked_at, message FROM status_checks
             WHERE service_url = ?1 ORDER BY checked_at DESC, id DESC LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![service_url, limit as i64], status_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Delete status checks older than `age`; returns the deleted count.
    pub fn prune_old(&self, age: Duration) -> Result<usize, DbError> {
        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d));
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM status_checks WHERE checked_at < ?1",
            params![fmt_time(cutoff)],
        )?;
        Ok(deleted)
    }

    // --- Transitions and incidents ---

    /// Record an observation and detect an up/down edge.
    ///
    /// Opens an incident when a service goes down (or is first seen down),
    /// closes the open incident when it comes back up, and upserts the
    /// service state row, all in one transaction. Returns whether the
    /// observation was a transition.
    pub fn record_transition(
        &self,
        service_url: &str,
        display_name: &str,
        is_up: bool,
        message: &str,
    ) -> Result<bool, DbError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let now = fmt_time(Utc::now());

        let prev: Option<bool> = tx
            .query_row(
                "SELECT is_up FROM service_state WHERE service_url = ?1",
                params![service_url],
                |row| row.get::<_, i64>(0).map(|v| v != 0),
            )
            .optional()?;

        let transitioned = match prev {
            // First observation: open an incident only if it is down.
            None => {
                if !is_up {
                    tx.execute(
                        "INSERT INTO incidents (service_url, service_name, started_at, message)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![service_url, display_name, now, message],
                    )?;
                }
                !is_up
            }
            Some(prev_up) if prev_up != is_up => {
                if is_up {
                    tx.execute(
                        "UPDATE incidents SET ended_at = ?1
                         WHERE service_url = ?2 AND ended_at IS NULL",
                        params![now, service_url],
                    )?;
                } else {
                    tx.execute(
                        "INSERT INTO incidents (service_url, service_name, started_at, message)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![service_url, display_name, now, message],
                    )?;
                }
                true
            }
            Some(_) => false,
        };

        tx.execute(
            "INSERT INTO service_state (service_url, is_up, last_checked)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(service_url) DO UPDATE SET
                 is_up = excluded.is_up,
                 last_checked = excluded.last_checked",
            params![service_url, is_up as i64, now],
        )?;

        tx.commit()?;
        Ok(transitioned)
    }

    /// The unique unresolved incident for a service, if any.
    pub fn get_ongoing_incident(&self, service_url: &str) -> Result<Option<Incident>, DbError> {
        let conn = self.conn.lock().unwrap();
        let incident = conn
            .query_row(
                "SELECT id, service_url, service_name, started_at, ended_at, message
                 FROM incidents WHERE service_url = ?1 AND ended_at IS NULL
                 ORDER BY started_at DESC LIMIT 1",
                params![service_url],
                incident_from_row,
            )
            .optional()?;
        Ok(incident)
    }

    /// Most recently resolved incidents, newest first, skipping incidents
    /// shorter than `min_duration`.
    ///
    /// The duration filter runs in memory because stored timestamps are not
    /// guaranteed to be arithmetically comparable by the engine; over-fetch
    /// by 3x and stop once `limit` rows survive the filter.
    pub fn recent_resolved_incidents(
        &self,
        limit: usize,
        min_duration: Duration,
    ) -> Result<Vec<Incident>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, service_url, service_name, started_at, ended_at, message
             FROM incidents WHERE ended_at IS NOT NULL
             ORDER BY ended_at DESC, id DESC LIMIT ?1",
        )?;
        let fetched = stmt
            .query_map(params![(limit * 3) as i64], incident_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        let min = chrono::Duration::from_std(min_duration).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let kept = fetched
            .into_iter()
            .filter(|i| i.duration_at(now) >= min)
            .take(limit)
            .collect();
        Ok(kept)
    }

    // --- Alerts ---

    /// Append a sent notification to the alerts log.
    pub fn record_alert(&self, alert: &Alert) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (service_url, alert_type, message, sent_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                alert.service_url,
                alert.kind.as_str(),
                alert.message,
                fmt_time(alert.timestamp)
            ],
        )?;
        Ok(())
    }

    /// Most recent alert for a service, if any.
    pub fn last_alert(&self, service_url: &str) -> Result<Option<AlertRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, service_url, alert_type, message, sent_at FROM alerts
                 WHERE service_url = ?1 ORDER BY sent_at DESC, id DESC LIMIT 1",
                params![service_url],
                alert_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Recent alerts across all services, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, service_url, alert_type, message, sent_at FROM alerts
             ORDER BY sent_at DESC, id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit as i64], alert_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Persist the last alert time for a service.
    pub fn update_last_alert(
        &self,
        service_url: &str,
        alert_time: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE service_state SET last_alert = ?1 WHERE service_url = ?2",
            params![fmt_time(alert_time), service_url],
        )?;
        Ok(())
    }

    // --- Service state ---

    /// The stored state for a service, if it has ever been observed.
    pub fn get_service_state(&self, service_url: &str) -> Result<Option<ServiceState>, DbError> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT service_url, is_up, last_checked, last_alert FROM service_state
                 WHERE service_url = ?1",
                params![service_url],
                |row| {
                    Ok(ServiceState {
                        service_url: row.get(0)?,
                        is_up: row.get::<_, i64>(1)? != 0,
                        last_checked: parse_db_time(&row.get::<_, String>(2)?),
                        last_alert: row
                            .get::<_, Option<String>>(3)?
                            .map(|s| parse_db_time(&s)),
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    /// Current up/down flag for every tracked service.
    pub fn get_all_service_states(&self) -> Result<HashMap<String, bool>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT service_url, is_up FROM service_state")?;
        let states = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
            })?
            .collect::<SqlResult<HashMap<_, _>>>()?;
        Ok(states)
    }
}

/// Canonical stored timestamp format: RFC3339 with nanoseconds, UTC.
fn fmt_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a datetime string from the database.
///
/// The engine may have normalized stored values, so several formats are
/// tried in order; unparseable input degrades to the Unix epoch.
fn parse_db_time(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
    ];
    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return DateTime::from_naive_utc_and_offset(dt, Utc);
        }
    }

    DateTime::<Utc>::UNIX_EPOCH
}

fn status_from_row(row: &rusqlite::Row<'_>) -> SqlResult<StatusRecord> {
    Ok(StatusRecord {
        id: row.get(0)?,
        service_url: row.get(1)?,
        is_up: row.get::<_, i64>(2)? != 0,
        checked_at: parse_db_time(&row.get::<_, String>(3)?),
        message: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

fn alert_from_row(row: &rusqlite::Row<'_>) -> SqlResult<AlertRecord> {
    Ok(AlertRecord {
        id: row.get(0)?,
        service_url: row.get(1)?,
        alert_type: row.get(2)?,
        message: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        sent_at: parse_db_time(&row.get::<_, String>(4)?),
    })
}

fn incident_from_row(row: &rusqlite::Row<'_>) -> SqlResult<Incident> {
    Ok(Incident {
        id: row.get(0)?,
        service_url: row.get(1)?,
        service_name: row.get(2)?,
        started_at: parse_db_time(&row.get::<_, String>(3)?),
        ended_at: row.get::<_, Option<String>>(4)?.map(|s| parse_db_time(&s)),
        message: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}
