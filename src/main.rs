//! Cooperative Trade Engine - Entry Point
//!
//! Initializes configuration, logging, the trade store and directory,
//! then serves the HTTP API and runs the expired-bid sweep until
//! SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Restore the trade store from state.json (if enabled)
//! 4. Load the directory seed (memberships, contributions, approvals)
//! 5. Open the JSONL audit log and the Prometheus registry
//! 6. Wire use cases and the axum router
//! 7. Spawn the HTTP server and the sweep loop
//! 8. Wait for SIGINT → graceful shutdown (drain→stop→save→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use coop_trade_engine::adapters::clock::SystemClock;
use coop_trade_engine::adapters::directory::StaticDirectory;
use coop_trade_engine::adapters::http::{self, Admission};
use coop_trade_engine::adapters::metrics::{HealthState, MetricsRegistry};
use coop_trade_engine::adapters::notify::LogNotifier;
use coop_trade_engine::adapters::persistence::{JsonlAuditLog, MemoryTradeStore, StateFile};
use coop_trade_engine::adapters::throttle::SlidingWindowThrottle;
use coop_trade_engine::app::{Ports, Services};
use coop_trade_engine::config;
use coop_trade_engine::ports::Clock;
use coop_trade_engine::usecases::SchedulerSweep;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.service.bind_address,
        sweep_enabled = config.scheduler.enabled,
        "Starting cooperative trade engine"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Trade store, restored from the state file ────────
    let store = Arc::new(MemoryTradeStore::new());
    let state_file = if config.persistence.state_file_enabled {
        let file = StateFile::new(&config.persistence.data_dir)
            .await
            .context("Failed to open state file")?;
        if let Some(image) = file.load().await.context("Failed to load state file")? {
            store.restore(image).await;
        }
        Some(file)
    } else {
        warn!("State file disabled, bids and offers are lost on restart");
        None
    };

    // ── 5. Directory seed ───────────────────────────────────
    let directory = match &config.directory.seed_path {
        Some(path) => StaticDirectory::load(path)
            .await
            .context("Failed to load directory seed")?,
        None => {
            warn!("No directory seed configured, no buyer is approved and no farmer has memberships");
            StaticDirectory::default()
        }
    };
    let directory = Arc::new(directory);

    // ── 6. Audit log, metrics, throttle ─────────────────────
    let audit = Arc::new(
        JsonlAuditLog::new(&config.persistence.data_dir)
            .await
            .context("Failed to open audit log")?,
    );
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let throttle = Arc::new(SlidingWindowThrottle::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── 7. Wire use cases and router ────────────────────────
    let services = Services::wire(
        &config,
        Ports {
            store: store.clone(),
            throttle: throttle.clone(),
            approval: directory.clone(),
            memberships: directory.membership_sources(),
            contributions: directory,
            notifier: Arc::new(LogNotifier),
            audit,
            clock: clock.clone(),
        },
        metrics.clone(),
    );
    let health = HealthState::new(services.store.clone());
    let admission = services.state.admission.clone();
    let app = http::router(services.state, health.clone());

    // ── 8. Spawn HTTP server ────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.service.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.service.bind_address))?;
    info!(address = %config.service.bind_address, "HTTP server listening");

    let mut http_shutdown = shutdown_tx.subscribe();
    let http_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.recv().await;
            })
            .await;
        if let Err(e) = served {
            error!(error = %e, "HTTP server failed");
        }
    });

    // ── 9. Spawn expired-bid sweep ──────────────────────────
    let sweep_handle = if config.scheduler.enabled {
        let sweep_shutdown = shutdown_tx.subscribe();
        let housekeeping = Housekeeping {
            throttle,
            admission,
            window: config.trade.submission_quota().window,
            clock,
        };
        Some(tokio::spawn(run_sweeper(
            services.sweep,
            metrics,
            housekeeping,
            Duration::from_secs(config.scheduler.interval_seconds),
            sweep_shutdown,
        )))
    } else {
        warn!("Scheduler sweep disabled, expired bids close only manually");
        None
    };

    info!("All tasks spawned, trade engine is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown (drain→stop→save→exit) ────────────

    // 1. Readiness probe → 503
    health.begin_drain();

    // 2. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 3. Let in-flight requests and the current sweep finish (up to 30s)
    let _ = tokio::time::timeout(Duration::from_secs(30), http_handle).await;
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }

    // 4. Persist the store
    if let Some(file) = state_file {
        if let Err(e) = file.save(store.export().await).await {
            error!(error = %e, "Failed to save state on shutdown");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Periodic cleanup riding on the sweep tick.
struct Housekeeping {
    throttle: Arc<SlidingWindowThrottle>,
    admission: Arc<Admission>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

/// Run the expired-bid sweep every `interval` until shutdown.
async fn run_sweeper(
    sweep: Arc<SchedulerSweep>,
    metrics: Arc<MetricsRegistry>,
    housekeeping: Housekeeping,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_s = interval.as_secs(), "Sweep loop started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                info!("Sweep loop received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let started = Instant::now();
                let report = sweep.sweep_once().await;
                metrics.observe_sweep(&report, started.elapsed().as_secs_f64());

                let idle_keys = housekeeping
                    .throttle
                    .purge_idle(housekeeping.window, housekeeping.clock.now())
                    .await;
                let idle_buckets = housekeeping.admission.purge_idle();
                if idle_keys + idle_buckets > 0 {
                    info!(idle_keys, idle_buckets, "Idle throttle state purged");
                }
            }
        }
    }

    info!("Sweep loop stopped cleanly");
}
