//! Service probes.
//!
//! Supports http-head, http-body-regex, tcp, icmp, and script checks.

mod http;
mod icmp;
mod script;
mod tcp;

pub use icmp::is_valid_hostname;
pub use script::parse_command;

use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probe error types. Construction failures are distinct from runtime
/// probe failures, which are reported through [`ProbeOutcome`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid service type: {0}")]
    InvalidType(String),
    #[error("address is required for {0} check")]
    AddressRequired(&'static str),
    #[error("port is required for tcp check")]
    PortRequired,
    #[error("host is required for icmp check")]
    HostRequired,
    #[error("invalid hostname for icmp check")]
    InvalidHostname,
    #[error("command is required for script check")]
    CommandRequired,
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A single endpoint to be tested, as described in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub display_name: String,
}

impl Service {
    /// Canonical identity used as the key in storage and notification state.
    pub fn identity(&self) -> &str {
        &self.address
    }

    /// Display name, falling back to the address, then the command
    /// executable name.
    pub fn display_name(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }
        if !self.address.is_empty() {
            return self.address.clone();
        }
        if let Some(first) = self.command.split_whitespace().next() {
            return first.to_string();
        }
        "unknown".to_string()
    }
}

/// Observed health of a service after one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Up,
    Degraded,
    Down,
}

impl Health {
    /// A service is operational when it is up or degraded.
    pub fn is_operational(self) -> bool {
        !matches!(self, Health::Down)
    }
}

/// The result of one probe, including wall-clock timing.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub health: Health,
    /// Short human-readable reason; empty when the service is up.
    pub reason: String,
    pub elapsed: Duration,
}

/// A constructed, validated probe for one service.
///
/// Probes are stateless; `check` may be called repeatedly.
#[derive(Debug)]
pub enum Probe {
    HttpHead { service: Service },
    HttpBodyRegex { service: Service, pattern: Regex },
    Tcp { service: Service },
    Icmp { service: Service },
    Script { service: Service, argv: Vec<String> },
}

impl Probe {
    /// Build a probe from a service descriptor, validating every field the
    /// service type requires.
    pub fn from_service(service: &Service) -> Result<Probe, ProbeError> {
        match service.kind.as_str() {
            "http-head" => {
                if service.address.is_empty() {
                    return Err(ProbeError::AddressRequired("http-head"));
                }
                Ok(Probe::HttpHead {
                    service: service.clone(),
                })
            }
            "http-body-regex" => {
                if service.address.is_empty() {
                    return Err(ProbeError::AddressRequired("http-body-regex"));
                }
                let pattern = Regex::new(&service.pattern)?;
                Ok(Probe::HttpBodyRegex {
                    service: service.clone(),
                    pattern,
                })
            }
            "tcp" => {
                if service.address.is_empty() {
                    return Err(ProbeError::AddressRequired("tcp"));
                }
                if service.port.is_empty() {
                    return Err(ProbeError::PortRequired);
                }
                Ok(Probe::Tcp {
                    service: service.clone(),
                })
            }
            "icmp" => {
                if service.address.is_empty() {
                    return Err(ProbeError::HostRequired);
                }
                if !is_valid_hostname(&service.address) {
                    return Err(ProbeError::InvalidHostname);
                }
                Ok(Probe::Icmp {
                    service: service.clone(),
                })
            }
            "script" => {
                let argv = parse_command(&service.command);
                if argv.is_empty() {
                    return Err(ProbeError::CommandRequired);
                }
                Ok(Probe::Script {
                    service: service.clone(),
                    argv,
                })
            }
            other => Err(ProbeError::InvalidType(other.to_string())),
        }
    }

    pub fn service(&self) -> &Service {
        match self {
            Probe::HttpHead { service }
            | Probe::HttpBodyRegex { service, .. }
            | Probe::Tcp { service }
            | Probe::Icmp { service }
            | Probe::Script { service, .. } => service,
        }
    }

    pub fn identity(&self) -> &str {
        self.service().identity()
    }

    pub fn display_name(&self) -> String {
        self.service().display_name()
    }

    /// Run the probe once, measuring the wall-clock duration of the check.
    pub async fn check(&self) -> ProbeOutcome {
        let start = Instant::now();
        let (health, reason) = match self {
            Probe::HttpHead { service } => http::head(&service.address).await,
            Probe::HttpBodyRegex { service, pattern } => {
                http::body_regex(&service.address, pattern).await
            }
            Probe::Tcp { service } => tcp::connect(&service.address, &service.port).await,
            Probe::Icmp { service } => icmp::ping(&service.address).await,
            Probe::Script { argv, .. } => script::run(argv).await,
        };
        ProbeOutcome {
            health,
            reason,
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(kind: &str) -> Service {
        Service {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Probe::from_service(&service("carrier-pigeon")).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidType(t) if t == "carrier-pigeon"));
    }

    #[test]
    fn test_tcp_requires_port() {
        let mut s = service("tcp");
        s.address = "example.com".to_string();
        assert!(matches!(
            Probe::from_service(&s),
            Err(ProbeError::PortRequired)
        ));

        s.port = "443".to_string();
        assert!(Probe::from_service(&s).is_ok());
    }

    #[test]
    fn test_icmp_requires_valid_host() {
        let s = service("icmp");
        assert!(matches!(
            Probe::from_service(&s),
            Err(ProbeError::HostRequired)
        ));

        let mut s = service("icmp");
        s.address = "example.com; rm -rf /".to_string();
        assert!(matches!(
            Probe::from_service(&s),
            Err(ProbeError::InvalidHostname)
        ));

        let mut s = service("icmp");
        s.address = "example.com".to_string();
        assert!(Probe::from_service(&s).is_ok());
    }

    #[test]
    fn test_script_requires_command() {
        assert!(matches!(
            Probe::from_service(&service("script")),
            Err(ProbeError::CommandRequired)
        ));
    }

    #[test]
    fn test_body_regex_requires_valid_pattern() {
        let mut s = service("http-body-regex");
        s.address = "http://example.com".to_string();
        s.pattern = "(unclosed".to_string();
        assert!(matches!(
            Probe::from_service(&s),
            Err(ProbeError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_http_requires_address() {
        assert!(matches!(
            Probe::from_service(&service("http-head")),
            Err(ProbeError::AddressRequired("http-head"))
        ));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut s = Service {
            kind: "http-head".to_string(),
            address: "http://example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(s.display_name(), "http://example.com");

        s.display_name = "Example".to_string();
        assert_eq!(s.display_name(), "Example");

        let script = Service {
            kind: "script".to_string(),
            command: "sh -c 'exit 0'".to_string(),
            ..Default::default()
        };
        assert_eq!(script.display_name(), "sh");

        assert_eq!(Service::default().display_name(), "unknown");
    }

    #[test]
    fn test_health_operational() {
        assert!(Health::Up.is_operational());
        assert!(Health::Degraded.is_operational());
        assert!(!Health::Down.is_operational());
    }
}
