//! The status page value and its JSON projection.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::checker::SweepResult;
use crate::db::{Incident, Store};

/// Data behind one rendered snapshot of the status page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub title: String,
    pub status: String,
    pub sweep: SweepResult,
    pub time: String,
    /// Empty when the system is not in maintenance mode.
    pub maintenance_message: String,
    pub past_incidents: Vec<PastIncident>,
}

/// Maps a status string for embedding in the page; anything unrecognized
/// collapses to "success".
pub fn status_html(s: &str) -> &str {
    match s {
        "danger" | "degraded" | "success" | "maintenance" => s,
        _ => "success",
    }
}

/// An incident entry for the page and the JSON endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PastIncident {
    pub service_name: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub is_ongoing: bool,
}

impl PastIncident {
    fn from_incident(incident: &Incident, now: DateTime<Utc>) -> Self {
        Self {
            service_name: incident.service_name.clone(),
            started_at: rfc3339(incident.started_at),
            ended_at: incident.ended_at.map(rfc3339),
            duration_ms: incident.duration_at(now).num_milliseconds(),
            message: if incident.message.is_empty() {
                None
            } else {
                Some(incident.message.clone())
            },
            is_ongoing: incident.is_ongoing(),
        }
    }
}

/// Collect incidents for display: ongoing outages for the given services
/// first, then recently resolved incidents. Store errors are logged; the
/// page renders without history rather than failing.
pub fn collect_past_incidents(
    store: &Store,
    identities: &[String],
    limit: usize,
    min_duration: Duration,
) -> Vec<PastIncident> {
    let now = Utc::now();
    let mut entries = Vec::new();

    for identity in identities {
        match store.get_ongoing_incident(identity) {
            Ok(Some(incident)) => entries.push(PastIncident::from_incident(&incident, now)),
            Ok(None) => {}
            Err(e) => tracing::error!("failed to load ongoing incident: {}", e),
        }
    }

    match store.recent_resolved_incidents(limit, min_duration) {
        Ok(resolved) => {
            entries.extend(resolved.iter().map(|i| PastIncident::from_incident(i, now)));
        }
        Err(e) => tracing::error!("failed to load resolved incidents: {}", e),
    }

    entries
}

/// One service in the JSON API response.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: String,
    pub updated: String,
    pub response_time_ms: u64,
}

/// The JSON API response for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub overall_status: String,
    pub services: Vec<ServiceStatus>,
    pub updated: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintenance_message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub past_incidents: Vec<PastIncident>,
}

/// Project a page into the API response shape.
///
/// `up` services keep their configured order; degraded and down entries
/// follow in map iteration order.
pub fn api_response(page: &Page) -> ApiResponse {
    let now = rfc3339(Utc::now());
    let mut services = Vec::new();

    for info in &page.sweep.up {
        services.push(ServiceStatus {
            name: info.name.clone(),
            status: "OK".to_string(),
            updated: now.clone(),
            response_time_ms: info.response_time.as_millis() as u64,
        });
    }
    for (name, info) in &page.sweep.degraded {
        services.push(ServiceStatus {
            name: name.clone(),
            status: "DEGRADED".to_string(),
            updated: now.clone(),
            response_time_ms: info.response_time.as_millis() as u64,
        });
    }
    for (name, info) in &page.sweep.down {
        services.push(ServiceStatus {
            name: name.clone(),
            status: "DOWN".to_string(),
            updated: now.clone(),
            response_time_ms: info.response_time.as_millis() as u64,
        });
    }

    let overall_status = match page.status.as_str() {
        "danger" => "DOWN",
        "degraded" => "DEGRADED",
        "maintenance" => "MAINTENANCE",
        _ => "OK",
    };

    ApiResponse {
        overall_status: overall_status.to_string(),
        services,
        updated: now,
        maintenance_message: page.maintenance_message.clone(),
        past_incidents: page.past_incidents.clone(),
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{OutageInfo, ServiceInfo, DEFAULT_OUTAGE_MINUTES};
    use tempfile::NamedTempFile;

    #[test]
    fn test_status_html_known_values_pass_through() {
        for s in ["danger", "degraded", "success", "maintenance"] {
            assert_eq!(status_html(s), s);
        }
    }

    #[test]
    fn test_status_html_unknown_maps_to_success() {
        assert_eq!(status_html(""), "success");
        assert_eq!(status_html("warning"), "success");
        assert_eq!(status_html("<script>alert(1)</script>"), "success");
    }

    fn sample_page() -> Page {
        let mut sweep = SweepResult {
            up: vec![
                ServiceInfo {
                    name: "http://a".to_string(),
                    response_time: Duration::from_millis(120),
                },
                ServiceInfo {
                    name: "http://b".to_string(),
                    response_time: Duration::from_millis(40),
                },
            ],
            ..Default::default()
        };
        sweep.down.insert(
            "http://c".to_string(),
            OutageInfo {
                minutes: DEFAULT_OUTAGE_MINUTES,
                response_time: Duration::from_millis(9),
            },
        );

        Page {
            title: "Status".to_string(),
            status: "danger".to_string(),
            sweep,
            time: "2024-05-01 10:00:00".to_string(),
            maintenance_message: String::new(),
            past_incidents: Vec::new(),
        }
    }

    #[test]
    fn test_api_response_ordering_and_statuses() {
        let resp = api_response(&sample_page());

        assert_eq!(resp.overall_status, "DOWN");
        assert_eq!(resp.services.len(), 3);
        // Up services keep their configured order.
        assert_eq!(resp.services[0].name, "http://a");
        assert_eq!(resp.services[0].status, "OK");
        assert_eq!(resp.services[0].response_time_ms, 120);
        assert_eq!(resp.services[1].name, "http://b");
        assert_eq!(resp.services[2].name, "http://c");
        assert_eq!(resp.services[2].status, "DOWN");
    }

    #[test]
    fn test_api_response_overall_mapping() {
        let mut page = sample_page();
        for (internal, external) in [
            ("success", "OK"),
            ("degraded", "DEGRADED"),
            ("danger", "DOWN"),
            ("maintenance", "MAINTENANCE"),
            ("bogus", "OK"),
        ] {
            page.status = internal.to_string();
            assert_eq!(api_response(&page).overall_status, external);
        }
    }

    #[test]
    fn test_api_response_omits_empty_optionals() {
        let json = serde_json::to_value(api_response(&sample_page())).unwrap();
        assert!(json.get("maintenance_message").is_none());
        assert!(json.get("past_incidents").is_none());

        let mut page = sample_page();
        page.maintenance_message = "upgrading".to_string();
        let json = serde_json::to_value(api_response(&page)).unwrap();
        assert_eq!(json["maintenance_message"], "upgrading");
    }

    #[test]
    fn test_collect_past_incidents() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        // One resolved incident and one ongoing.
        store
            .record_transition("http://a", "a", false, "timeout")
            .unwrap();
        store.record_transition("http://a", "a", true, "").unwrap();
        store
            .record_transition("http://b", "b", false, "refused")
            .unwrap();

        let identities = vec!["http://a".to_string(), "http://b".to_string()];
        let entries = collect_past_incidents(&store, &identities, 10, Duration::ZERO);

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_ongoing);
        assert_eq!(entries[0].service_name, "b");
        assert_eq!(entries[0].message.as_deref(), Some("refused"));
        assert!(!entries[1].is_ongoing);
        assert_eq!(entries[1].service_name, "a");
        assert!(entries[1].ended_at.is_some());
    }
}
