//! TCP connect probe.

use std::time::Duration;

use tokio::net::TcpStream;

use super::http::SERVICE_UNAVAILABLE;
use super::Health;

/// Deadline for TCP connection attempts, including DNS resolution.
const TCP_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempt a TCP connection to `address:port`; the connection is closed
/// immediately on success.
pub(super) async fn connect(address: &str, port: &str) -> (Health, String) {
    let target = format!("{}:{}", address, port);

    match tokio::time::timeout(TCP_DIAL_TIMEOUT, TcpStream::connect(&target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            (Health::Up, String::new())
        }
        Ok(Err(_)) | Err(_) => (Health::Down, SERVICE_UNAVAILABLE.to_string()),
    }
}
