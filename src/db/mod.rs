//! SQLite persistence for checks, alerts, incidents, and service state.

mod models;
mod store;

pub use models::*;
pub use store::*;
