//! HTTP probe implementations: status-only HEAD and body regex matching.

use regex::Regex;

use super::Health;

/// Reason reported when a service responds but is not healthy.
pub(super) const SERVICE_UNAVAILABLE: &str = "service unavailable";

/// Reason reported when a response body does not match the expected pattern.
pub(super) const REGEX_NOT_FOUND: &str = "regex not found";

/// Issue a HEAD request; only an exact 200 counts as up.
pub(super) async fn head(address: &str) -> (Health, String) {
    let client = match reqwest::Client::builder().build() {
        Ok(c) => c,
        Err(e) => return (Health::Down, e.to_string()),
    };

    match client.head(address).send().await {
        Ok(resp) if valid_status(resp.status().as_u16()) => (Health::Up, String::new()),
        Ok(_) => (Health::Down, SERVICE_UNAVAILABLE.to_string()),
        Err(e) => (Health::Down, e.to_string()),
    }
}

/// Issue a GET request and match the full body against `pattern`.
pub(super) async fn body_regex(address: &str, pattern: &Regex) -> (Health, String) {
    let client = match reqwest::Client::builder().build() {
        Ok(c) => c,
        Err(e) => return (Health::Down, e.to_string()),
    };

    let resp = match client.get(address).send().await {
        Ok(r) => r,
        Err(e) => return (Health::Down, e.to_string()),
    };

    if !valid_status(resp.status().as_u16()) {
        return (Health::Down, SERVICE_UNAVAILABLE.to_string());
    }

    let body = match resp.text().await {
        Ok(b) => b,
        Err(e) => return (Health::Down, e.to_string()),
    };

    if pattern.is_match(&body) {
        (Health::Up, String::new())
    } else {
        (Health::Down, REGEX_NOT_FOUND.to_string())
    }
}

/// Checks the status code against the list of known-good codes.
fn valid_status(code: u16) -> bool {
    code == 200
}
