//! One full probe sweep: check every service, record results, notify, and
//! bucket services into up / degraded / down.

use std::collections::HashMap;
use std::time::Duration;

use crate::db::Store;
use crate::notify::NotificationManager;
use crate::probe::{Health, Probe};

/// Placeholder outage duration shown for degraded and down services until
/// real downtime accounting exists.
pub const DEFAULT_OUTAGE_MINUTES: i64 = 60;

/// An operational service in the sweep result.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub response_time: Duration,
}

/// A degraded or down service in the sweep result.
#[derive(Debug, Clone)]
pub struct OutageInfo {
    pub minutes: i64,
    pub response_time: Duration,
}

/// Aggregated result of one sweep. `up` preserves the configured service
/// order; `degraded` and `down` are keyed by display name.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub up: Vec<ServiceInfo>,
    pub degraded: HashMap<String, OutageInfo>,
    pub down: HashMap<String, OutageInfo>,
}

/// Check all services in order and categorize them.
///
/// When `maintenance_msg` is non-empty, probing is skipped entirely and
/// every service lands in `up` with zero elapsed time. Storage and the
/// notification manager are optional; their errors are logged and the sweep
/// continues. A sweep never fails.
pub async fn check_all_services(
    probes: &[Probe],
    storage: Option<&Store>,
    notify_manager: Option<&NotificationManager>,
    maintenance_msg: &str,
) -> SweepResult {
    let mut result = SweepResult::default();

    if !maintenance_msg.is_empty() {
        tracing::info!("maintenance mode active: {}", maintenance_msg);
        tracing::info!("skipping status checks for {} services", probes.len());
        for probe in probes {
            result.up.push(ServiceInfo {
                name: probe.display_name(),
                response_time: Duration::ZERO,
            });
        }
        return result;
    }

    for probe in probes {
        let outcome = probe.check().await;
        let identity = probe.identity();
        let display_name = probe.display_name();
        let operational = outcome.health.is_operational();

        if let Some(storage) = storage {
            if let Err(e) =
                storage.record_transition(identity, &display_name, operational, &outcome.reason)
            {
                tracing::error!("storage: failed to record status transition: {}", e);
            }
            if let Err(e) = storage.record_status(identity, operational, &outcome.reason) {
                tracing::error!("storage: failed to record status: {}", e);
            }
        }

        if let Some(nm) = notify_manager {
            nm.check_and_notify(identity, operational).await;
        }

        match outcome.health {
            Health::Up => result.up.push(ServiceInfo {
                name: display_name,
                response_time: outcome.elapsed,
            }),
            Health::Degraded => {
                result.degraded.insert(
                    display_name,
                    OutageInfo {
                        minutes: DEFAULT_OUTAGE_MINUTES,
                        response_time: outcome.elapsed,
                    },
                );
            }
            Health::Down => {
                result.down.insert(
                    display_name,
                    OutageInfo {
                        minutes: DEFAULT_OUTAGE_MINUTES,
                        response_time: outcome.elapsed,
                    },
                );
            }
        }
    }

    result
}

/// Overall page status by priority: maintenance, then danger (anything
/// down), then degraded, then success.
pub fn determine_overall_status(maintenance_msg: &str, result: &SweepResult) -> &'static str {
    if !maintenance_msg.is_empty() {
        "maintenance"
    } else if !result.down.is_empty() {
        "danger"
    } else if !result.degraded.is_empty() {
        "degraded"
    } else {
        "success"
    }
}
