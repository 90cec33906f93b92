//! ICMP probe via the platform ping utility.
//!
//! Shelling out avoids raw-socket privileges; hostnames are validated at
//! construction so nothing unvetted ever reaches the command line.

use std::net::IpAddr;
use std::process::Stdio;

use tokio::process::Command;

use super::http::SERVICE_UNAVAILABLE;
use super::Health;

/// Per-attempt ping timeout in seconds (string for the CLI argument).
const ICMP_PING_TIMEOUT_SECS: &str = "5";

/// Run one ping against `host`. Any non-zero exit is down.
pub(super) async fn ping(host: &str) -> (Health, String) {
    // macOS/BSD ping takes the timeout as -t; Linux uses -W.
    // Windows is not supported (-n/-w with different semantics).
    let timeout_flag = if cfg!(any(target_os = "macos", target_os = "freebsd")) {
        "-t"
    } else {
        "-W"
    };

    let status = Command::new("ping")
        .args(["-c", "1", timeout_flag, ICMP_PING_TIMEOUT_SECS, host])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(s) if s.success() => (Health::Up, String::new()),
        Ok(_) => (Health::Down, SERVICE_UNAVAILABLE.to_string()),
        Err(e) => (Health::Down, e.to_string()),
    }
}

/// Checks whether a string is a valid hostname or IP address literal.
///
/// Hostname labels must be alphanumeric with interior hyphens, at most 63
/// bytes each, 253 bytes total. Anything else (shell metacharacters
/// included) is rejected.
pub fn is_valid_hostname(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    for part in host.split('.') {
        if part.is_empty() || part.len() > 63 {
            return false;
        }
        let bytes = part.as_bytes();
        for (i, c) in bytes.iter().enumerate() {
            let alnum = c.is_ascii_alphanumeric();
            let interior_hyphen = *c == b'-' && i > 0 && i < bytes.len() - 1;
            if !alnum && !interior_hyphen {
                return false;
            }
        }
    }
    true
}
