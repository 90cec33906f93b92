//! Service status monitoring core.
//!
//! Periodically probes a configured set of services (HTTP, TCP, ICMP,
//! scripts), records state transitions as incidents in SQLite, sends alerts
//! through notification channels with per-service cooldowns, and serves the
//! aggregated snapshot as an HTML page and a JSON endpoint.

pub mod checker;
pub mod config;
pub mod db;
pub mod notify;
pub mod page;
pub mod probe;
pub mod web;
