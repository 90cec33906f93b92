//! Web server exposing the status page and the JSON API.

mod handlers;

pub use handlers::*;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::page::Page;

/// Application state shared across handlers. The page is replaced after
/// every sweep; handlers only ever read it.
#[derive(Clone)]
pub struct AppState {
    pub page: Arc<RwLock<Page>>,
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/", get(handlers::handle_index))
        // Method filtering happens inside the handler so non-GET requests
        // get the documented 405 body.
        .route("/api/status", any(handlers::handle_api_status))
        .layer(cors)
        .with_state(state)
}

/// HTTP server for the status page.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Bind the configured port and serve until the process exits.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = router(self.state.clone());

        tracing::info!("web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
