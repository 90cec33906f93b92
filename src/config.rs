//! Configuration loading.
//!
//! Reads a JSON config file with sensible defaults; environment variables
//! prefixed `SERVICE_STATUS_` override the scalar values.

use std::env;
use std::fs;

use serde::Deserialize;
use thiserror::Error;

use crate::notify::{Notifier, NotifierConfig, NotifyError};
use crate::probe::{Probe, ProbeError, Service};

/// Default cooldown between alerts for the same service, in seconds.
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Full application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub services: Vec<Service>,
    pub notifiers: Vec<NotifierConfig>,
    /// Minimum time between alerts for the same service, in seconds.
    pub alert_cooldown: u64,
    /// Path to the SQLite database; empty disables storage.
    pub storage_path: String,
    /// Path to a file whose non-blank content puts the system into
    /// maintenance mode. Takes precedence over the inline message.
    pub maintenance_file: String,
    /// Inline maintenance message fallback.
    pub maintenance_message: String,
    /// Maximum number of past incidents to display.
    pub incident_history_limit: usize,
    /// Incidents shorter than this many seconds are hidden from history.
    pub min_incident_duration: u64,
    /// Seconds between sweeps.
    pub check_interval: u64,
    /// Status checks older than this many days are pruned; 0 disables.
    pub retention_days: u64,
    /// HTTP port for the status page.
    pub listen_port: u16,
    /// Page title.
    pub title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            notifiers: Vec::new(),
            alert_cooldown: DEFAULT_ALERT_COOLDOWN_SECS,
            storage_path: String::new(),
            maintenance_file: String::new(),
            maintenance_message: String::new(),
            incident_history_limit: 10,
            min_incident_duration: 0,
            check_interval: 60,
            retention_days: 30,
            listen_port: 8080,
            title: "Service Status".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and apply environment overrides.
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override scalar settings from `SERVICE_STATUS_*` environment
    /// variables. Unparseable numeric values are ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVICE_STATUS_ALERT_COOLDOWN") {
            if let Ok(n) = v.parse() {
                self.alert_cooldown = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_STORAGE_PATH") {
            self.storage_path = v;
        }
        if let Ok(v) = env::var("SERVICE_STATUS_MAINTENANCE_FILE") {
            self.maintenance_file = v;
        }
        if let Ok(v) = env::var("SERVICE_STATUS_MAINTENANCE_MESSAGE") {
            self.maintenance_message = v;
        }
        if let Ok(v) = env::var("SERVICE_STATUS_INCIDENT_HISTORY_LIMIT") {
            if let Ok(n) = v.parse() {
                self.incident_history_limit = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_MIN_INCIDENT_DURATION") {
            if let Ok(n) = v.parse() {
                self.min_incident_duration = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_CHECK_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.check_interval = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_RETENTION_DAYS") {
            if let Ok(n) = v.parse() {
                self.retention_days = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_LISTEN_PORT") {
            if let Ok(n) = v.parse() {
                self.listen_port = n;
            }
        }
        if let Ok(v) = env::var("SERVICE_STATUS_TITLE") {
            self.title = v;
        }
    }

    /// Resolve the active maintenance message.
    ///
    /// The maintenance file wins when it exists and contains non-blank
    /// content; otherwise the inline message applies. Re-read on every call
    /// so operators can toggle maintenance without a restart.
    pub fn maintenance_message(&self) -> String {
        if !self.maintenance_file.is_empty() {
            match fs::read_to_string(&self.maintenance_file) {
                Ok(content) => {
                    let trimmed = content.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "failed to read maintenance file {}: {}",
                            self.maintenance_file,
                            e
                        );
                    }
                }
            }
        }
        self.maintenance_message.clone()
    }

    /// Build probes for every configured service.
    ///
    /// Unknown service types are logged and skipped; a known type with
    /// missing or invalid fields is a hard error.
    pub fn create_probes(&self) -> Result<Vec<Probe>, ProbeError> {
        let mut probes = Vec::new();
        for service in &self.services {
            match Probe::from_service(service) {
                Ok(probe) => probes.push(probe),
                Err(ProbeError::InvalidType(t)) => {
                    tracing::warn!("unknown service type {:?}, skipping", t);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(probes)
    }

    /// Build notifiers for every configured channel.
    pub fn create_notifiers(&self) -> Result<Vec<Notifier>, NotifyError> {
        self.notifiers.iter().map(Notifier::from_config).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.alert_cooldown, 300);
        assert_eq!(config.incident_history_limit, 10);
        assert_eq!(config.min_incident_duration, 0);
        assert_eq!(config.check_interval, 60);
        assert_eq!(config.listen_port, 8080);
        assert!(config.storage_path.is_empty());
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_load_json() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{
                "services": [
                    {{"type": "http-head", "address": "http://a"}},
                    {{"type": "tcp", "address": "db.local", "port": "5432", "display_name": "DB"}}
                ],
                "notifiers": [{{"type": "log"}}],
                "alert_cooldown": 120,
                "storage_path": "status.db"
            }}"#
        )
        .unwrap();

        let config = Config::load(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].kind, "http-head");
        assert_eq!(config.services[1].display_name(), "DB");
        assert_eq!(config.alert_cooldown, 120);
        assert_eq!(config.storage_path, "status.db");
        // Unspecified keys keep their defaults.
        assert_eq!(config.incident_history_limit, 10);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/config.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "not json").unwrap();
        assert!(matches!(
            Config::load(tmp.path().to_str().unwrap()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"alert_cooldown": 120}}"#).unwrap();

        env::set_var("SERVICE_STATUS_ALERT_COOLDOWN", "45");
        env::set_var("SERVICE_STATUS_TITLE", "Ops Status");
        env::set_var("SERVICE_STATUS_LISTEN_PORT", "not-a-port");
        let config = Config::load(tmp.path().to_str().unwrap()).unwrap();
        env::remove_var("SERVICE_STATUS_ALERT_COOLDOWN");
        env::remove_var("SERVICE_STATUS_TITLE");
        env::remove_var("SERVICE_STATUS_LISTEN_PORT");

        assert_eq!(config.alert_cooldown, 45);
        assert_eq!(config.title, "Ops Status");
        assert_eq!(config.listen_port, 8080);
    }

    #[test]
    fn test_maintenance_file_precedence() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  in progress \n").unwrap();

        let config = Config {
            maintenance_file: file.path().to_str().unwrap().to_string(),
            maintenance_message: "inline".to_string(),
            ..Default::default()
        };
        assert_eq!(config.maintenance_message(), "in progress");
    }

    #[test]
    fn test_maintenance_falls_back_to_inline() {
        // Missing file: fall through to the inline message.
        let config = Config {
            maintenance_file: "/nonexistent/maintenance.txt".to_string(),
            maintenance_message: "inline".to_string(),
            ..Default::default()
        };
        assert_eq!(config.maintenance_message(), "inline");

        // Blank file content is not a maintenance message.
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n ").unwrap();
        let config = Config {
            maintenance_file: file.path().to_str().unwrap().to_string(),
            maintenance_message: "inline".to_string(),
            ..Default::default()
        };
        assert_eq!(config.maintenance_message(), "inline");

        let config = Config::default();
        assert_eq!(config.maintenance_message(), "");
    }

    #[test]
    fn test_create_probes_skips_unknown_types() {
        let config = Config {
            services: vec![
                Service {
                    kind: "http-head".to_string(),
                    address: "http://a".to_string(),
                    ..Default::default()
                },
                Service {
                    kind: "smtp".to_string(),
                    address: "mail.local".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let probes = config.create_probes().unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].identity(), "http://a");
    }

    #[test]
    fn test_create_probes_rejects_invalid_fields() {
        let config = Config {
            services: vec![Service {
                kind: "tcp".to_string(),
                address: "db.local".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            config.create_probes(),
            Err(ProbeError::PortRequired)
        ));
    }

    #[test]
    fn test_create_notifiers() {
        let config = Config {
            notifiers: vec![
                NotifierConfig {
                    kind: "log".to_string(),
                    ..Default::default()
                },
                NotifierConfig {
                    kind: "slack".to_string(),
                    webhook_url: "http://localhost/hook".to_string(),
                    channel: "#ops".to_string(),
                    username: "statusbot".to_string(),
                },
            ],
            ..Default::default()
        };

        let notifiers = config.create_notifiers().unwrap();
        assert_eq!(notifiers.len(), 2);
        assert_eq!(notifiers[0].kind(), "log");
        assert_eq!(notifiers[1].kind(), "slack");

        let bad = Config {
            notifiers: vec![NotifierConfig {
                kind: "carrier-pigeon".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            bad.create_notifiers(),
            Err(NotifyError::InvalidNotifier(_))
        ));
    }
}
