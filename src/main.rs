//! Service status daemon.
//!
//! Loads configuration, sweeps all configured services on an interval, and
//! serves the status page.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use service_status::checker::{check_all_services, determine_overall_status};
use service_status::config::Config;
use service_status::db::Store;
use service_status::notify::NotificationManager;
use service_status::page::{collect_past_incidents, Page};
use service_status::probe::Probe;
use service_status::web::{AppState, Server};

#[tokio::main]
async fn main() {
    let Some(config_path) = std::env::args().nth(1) else {
        eprintln!("Missing path to config");
        process::exit(2);
    };

    if let Err(e) = run(&config_path).await {
        eprintln!("fatal: {}", e);
        process::exit(1);
    }
}

async fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("service_status=info".parse()?),
        )
        .init();

    let config = Config::load(config_path)?;

    let probes = Arc::new(config.create_probes()?);
    tracing::info!("monitoring {} services", probes.len());

    let store = if config.storage_path.is_empty() {
        None
    } else {
        tracing::info!("using database at {}", config.storage_path);
        Some(Arc::new(Store::new(&config.storage_path)?))
    };

    let mut manager = NotificationManager::new(Duration::from_secs(config.alert_cooldown));
    if let Some(store) = &store {
        manager = manager.with_storage(store.clone());
    }
    for notifier in config.create_notifiers()? {
        manager.add_notifier(notifier);
    }
    let manager = Arc::new(manager);

    let identities: Vec<String> = probes.iter().map(|p| p.identity().to_string()).collect();
    let page = Arc::new(RwLock::new(Page::default()));

    // Sweep once before the server comes up so the page is never empty.
    run_sweep(&config, &probes, store.as_deref(), &manager, &identities, &page).await;

    spawn_sweep_loop(
        config.clone(),
        probes.clone(),
        store.clone(),
        manager.clone(),
        identities,
        page.clone(),
    );
    spawn_retention_task(&config, store.clone());

    let server = Server::new(config.listen_port, AppState { page });
    server.start().await
}

/// Re-run the sweep every `check_interval` seconds. Sweeps never overlap:
/// each one completes before the next tick is awaited.
fn spawn_sweep_loop(
    config: Config,
    probes: Arc<Vec<Probe>>,
    store: Option<Arc<Store>>,
    manager: Arc<NotificationManager>,
    identities: Vec<String>,
    page: Arc<RwLock<Page>>,
) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.check_interval.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The immediate first tick is covered by the startup sweep.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_sweep(&config, &probes, store.as_deref(), &manager, &identities, &page).await;
        }
    });
}

/// Prune old status checks once an hour when retention is configured.
fn spawn_retention_task(config: &Config, store: Option<Arc<Store>>) {
    let Some(store) = store else { return };
    if config.retention_days == 0 {
        return;
    }
    let age = Duration::from_secs(config.retention_days * 24 * 3600);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match store.prune_old(age) {
                Ok(0) => {}
                Ok(n) => tracing::info!("pruned {} old status checks", n),
                Err(e) => tracing::error!("failed to prune status checks: {}", e),
            }
        }
    });
}

async fn run_sweep(
    config: &Config,
    probes: &[Probe],
    store: Option<&Store>,
    manager: &NotificationManager,
    identities: &[String],
    page: &RwLock<Page>,
) {
    let maintenance = config.maintenance_message();
    let sweep = check_all_services(probes, store, Some(manager), &maintenance).await;
    let status = determine_overall_status(&maintenance, &sweep);

    let past_incidents = match store {
        Some(store) => collect_past_incidents(
            store,
            identities,
            config.incident_history_limit,
            Duration::from_secs(config.min_incident_duration),
        ),
        None => Vec::new(),
    };

    let mut guard = page.write().await;
    *guard = Page {
        title: config.title.clone(),
        status: status.to_string(),
        sweep,
        time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        maintenance_message: maintenance,
        past_incidents,
    };
}
