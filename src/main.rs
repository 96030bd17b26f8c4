//! The `chapterwatch` daemon: runs the update checker until SIGINT/SIGTERM.
//!
//! Interactive front ends link the library instead and build a
//! `WatchService` from the same config via `Config::listing_sizes`.
use anyhow::{Context, Result};
use chapterwatch::catalog::{Catalog, HttpCatalog};
use chapterwatch::checker::{CheckerSettings, UpdateChecker};
use chapterwatch::config::Config;
use chapterwatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use chapterwatch::storage::{Database, DatabaseError};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Get the config directory path (~/.config/chapterwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("chapterwatch"))
}

#[derive(Parser, Debug)]
#[command(
    name = "chapterwatch",
    about = "Watches a serialized-fiction catalog and announces new chapters"
)]
struct Args {
    /// Config file (default: ~/.config/chapterwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single update cycle and exit
    #[arg(long)]
    once: bool,

    /// Log notifications instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere).
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down gracefully");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // User-only access; the database holds user ids
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    tracing::debug!(config = ?config, "Effective configuration");

    let db_path = config.database_path(&config_dir);
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        tracing::info!(path = %db_path.display(), "Database reset");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of chapterwatch appears to be running. Please stop it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let catalog: Arc<dyn Catalog> = Arc::new(
        HttpCatalog::new(
            &config.api_base_url,
            config.request_timeout(),
            config.search_page_size,
        )
        .context("Failed to build catalog client")?,
    );

    let notifier: Arc<dyn Notifier> = if args.dry_run {
        tracing::info!("Dry run: notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Arc::new(WebhookNotifier::new(
            client,
            config.webhook_url().context("Notifier is not configured")?,
            config.request_timeout(),
        ))
    };

    let checker = Arc::new(UpdateChecker::new(
        db,
        catalog,
        notifier,
        CheckerSettings {
            channel_id: config.update_channel_id.clone(),
            reader_base_url: config.reader_base_url.clone(),
            title_delay: config.title_delay(),
            zero_subscriber_policy: config.zero_subscriber_policy,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if args.once {
        let cycle = {
            let checker = Arc::clone(&checker);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move { checker.run_cycle(&shutdown_rx).await })
        };
        tokio::pin!(cycle);
        let report = tokio::select! {
            report = &mut cycle => report.context("Update cycle panicked")?,
            signal = wait_for_signal() => {
                signal?;
                let _ = shutdown_tx.send(true);
                cycle.await.context("Update cycle panicked")?
            }
        };
        println!(
            "Checked {} titles, {} notified{}",
            report.outcomes.len(),
            report.count(chapterwatch::checker::TitleOutcome::Notified),
            if report.interrupted { " (interrupted)" } else { "" }
        );
        return Ok(());
    }

    let runner = {
        let checker = Arc::clone(&checker);
        let interval = config.check_interval();
        tokio::spawn(async move { checker.run(interval, shutdown_rx).await })
    };
    tracing::info!(
        interval_minutes = config.check_interval_minutes,
        channel = %config.update_channel_id,
        "Update checker running"
    );

    wait_for_signal().await?;
    let _ = shutdown_tx.send(true);
    runner.await.context("Update checker panicked")?;

    Ok(())
}
