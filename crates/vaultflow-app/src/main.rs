//! Vaultflow application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Build the workflow engine (record store, rate limiter, breakers,
//!    dry-run transports)
//! 4. Run the requested subcommand: `init`, `run-once` or `watch`

mod cli;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use vaultflow_core::config::WatcherSettings;
use vaultflow_core::{VaultLayout, VaultflowConfig};
use vaultflow_workflow::capability::{DryRunEmailSender, DryRunSocialPoster, EmptyMailSource};
use vaultflow_workflow::watcher::{
    ApprovedHandler, FileHandler, InboxHandler, InstanceLock, MailIntake, PendingApprovalHandler,
    PollingEventSource,
};
use vaultflow_workflow::{
    CircuitBreakerConfig, PlanExecutor, RateLimiter, ReasoningLoop, RecordStore, Watcher,
    WatcherConfig,
};

use cli::{CliArgs, Command};

const LOCK_FILE: &str = ".vaultflow.lock";

/// Apply the shared `[watchers]` settings to a handler's own config.
fn tune(mut config: WatcherConfig, settings: &WatcherSettings) -> WatcherConfig {
    config.file_pattern = settings.file_pattern.clone();
    config.max_errors = settings.max_errors;
    config.debounce = Duration::from_secs(settings.debounce_secs);
    config
}

fn build_reasoning(config: &VaultflowConfig, layout: &VaultLayout, store: &RecordStore) -> ReasoningLoop {
    let limits: HashMap<String, u32> = config.rate_limits.clone().into_iter().collect();
    let executor = PlanExecutor::new(
        layout.clone(),
        store.clone(),
        Arc::new(RateLimiter::new(limits)),
        Arc::new(DryRunEmailSender::new()),
        Arc::new(DryRunSocialPoster::new()),
    )
    .with_breaker_config(CircuitBreakerConfig::from(&config.circuit_breaker));
    ReasoningLoop::new(layout.clone(), store.clone(), executor)
}

fn start_watcher<H: FileHandler>(
    config: WatcherConfig,
    handler: H,
    source: &PollingEventSource,
) -> Result<Arc<Watcher<H>>, Box<dyn std::error::Error>> {
    let watcher = Arc::new(Watcher::new(config, handler));
    watcher.start(source)?;
    Ok(watcher)
}

fn init(config: &VaultflowConfig, config_file: &Path, layout: &VaultLayout) -> Result<(), Box<dyn std::error::Error>> {
    layout.ensure_all()?;
    tracing::info!(vault = %layout.root().display(), "Vault folders ready");
    if !config_file.exists() {
        config.save(config_file)?;
    }
    Ok(())
}

async fn watch(
    config: &VaultflowConfig,
    layout: &VaultLayout,
    store: &RecordStore,
) -> Result<(), Box<dyn std::error::Error>> {
    layout.ensure_all()?;
    let _lock = InstanceLock::acquire(&layout.root().join(LOCK_FILE))?;

    let source = PollingEventSource::new(Duration::from_millis(config.watchers.poll_interval_ms))
        .report_existing(true);
    let settings = &config.watchers;

    let inbox = start_watcher(
        tune(InboxHandler::config(layout), settings),
        InboxHandler::new(layout.clone(), store.clone()),
        &source,
    )?;
    let pending = start_watcher(
        tune(PendingApprovalHandler::config(layout), settings),
        PendingApprovalHandler::new(store.clone()),
        &source,
    )?;
    let approved = start_watcher(
        tune(ApprovedHandler::config(layout), settings),
        ApprovedHandler::new(store.clone()),
        &source,
    )?;

    let mail = config.mail.enabled.then(|| {
        tracing::info!("No inbound mail transport configured; mail intake will stay idle");
        let intake = Arc::new(MailIntake::new(
            Arc::new(EmptyMailSource),
            layout.clone(),
            store.clone(),
            Duration::from_secs(config.mail.poll_interval_secs),
        ));
        let runner = Arc::clone(&intake);
        let handle = tokio::spawn(async move { runner.run().await });
        (intake, handle)
    });

    let reasoning = build_reasoning(config, layout, store);
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.general.reasoning_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        interval_secs = config.general.reasoning_interval_secs,
        "Watching vault. Press Ctrl-C to stop"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reasoning.run().await;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    inbox.stop().await;
    pending.stop().await;
    approved.stop().await;
    if let Some((intake, handle)) = mail {
        intake.shutdown();
        let _ = handle.await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let config = if config_exists {
        VaultflowConfig::load(&config_file)?
    } else {
        VaultflowConfig::default()
    };

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Vaultflow v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    let layout = VaultLayout::new(args.resolve_vault_root(&config.general.vault_root));
    let store = RecordStore::from_settings(&config.record_store);

    match args.command {
        Command::Init => init(&config, &config_file, &layout)?,
        Command::RunOnce => {
            layout.ensure_all()?;
            let report = build_reasoning(&config, &layout, &store).run().await;
            tracing::info!(report = ?report, "Reasoning pass finished");
        }
        Command::Watch => watch(&config, &layout, &store).await?,
    }

    Ok(())
}
