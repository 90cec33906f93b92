//! Script probe: run an external command and interpret its exit code.
//!
//! Exit 0 = up, 80 = degraded, anything else (signal, spawn failure,
//! deadline exceeded) = down. Commands come from the config file, which
//! should be protected with appropriate file permissions.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::http::SERVICE_UNAVAILABLE;
use super::Health;

/// Reason reported when a script signals degraded operation.
const SERVICE_DEGRADED: &str = "service degraded";

/// Exit code that indicates a degraded service.
const SCRIPT_EXIT_CODE_DEGRADED: i32 = 80;

/// Deadline for script execution; the child is killed when it fires.
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the tokenized command and classify its exit status.
pub(super) async fn run(argv: &[String]) -> (Health, String) {
    let mut child = match Command::new(&argv[0])
        .args(&argv[1..])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return (Health::Down, e.to_string()),
    };

    match tokio::time::timeout(SCRIPT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => match status.code() {
            Some(0) => (Health::Up, String::new()),
            Some(SCRIPT_EXIT_CODE_DEGRADED) => (Health::Degraded, SERVICE_DEGRADED.to_string()),
            // Any other exit code, or termination by signal.
            _ => (Health::Down, SERVICE_UNAVAILABLE.to_string()),
        },
        Ok(Err(e)) => (Health::Down, e.to_string()),
        Err(_) => {
            let _ = child.kill().await;
            (Health::Down, SERVICE_UNAVAILABLE.to_string())
        }
    }
}

/// Split a command string into executable and arguments.
///
/// Single and double quotes group words; the outer quotes are stripped.
pub fn parse_command(cmd: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote_char: Option<char> = None;

    for c in cmd.chars() {
        match c {
            '"' | '\'' => match quote_char {
                None => quote_char = Some(c),
                Some(q) if q == c => quote_char = None,
                Some(_) => current.push(c),
            },
            ' ' if quote_char.is_none() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
