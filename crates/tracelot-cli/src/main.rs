//! Operator CLI for the distribution-tracing sync pipeline.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::PgPool;

use tracelot_core::AppConfig;
use tracelot_db::PoolConfig;
use tracelot_shipstation::ShipstationClient;
use tracelot_sync::{
    archive_and_rebuild, NeverCancel, PgCancelProbe, PgCustomerDirectory, PgProgressSink,
    SyncEngine, SyncError, SyncOptions,
};

/// Seconds without a heartbeat before a `running` status is reclassified
/// as stale.
const STALE_AFTER_SECS: i64 = 600;

#[derive(Debug, Parser)]
#[command(name = "tracelot")]
#[command(about = "ShipStation distribution-tracing sync pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an order sync over the configured date window.
    Sync {
        /// Override the window start date (YYYY-MM-DD); defaults to today
        /// minus the configured window.
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Override the window length in days.
        #[arg(long)]
        days: Option<i64>,
        /// Stop after this many orders have persisted.
        #[arg(long)]
        max_orders: Option<u32>,
        /// Inter-page throttle in seconds.
        #[arg(long)]
        throttle_secs: Option<u64>,
    },
    /// Archive the live sync rows and rebuild the ledger from 2019 onward.
    Rebuild {
        /// Required acknowledgement: this deletes and re-syncs every
        /// sync-sourced row.
        #[arg(long)]
        confirm: bool,
    },
    /// Show the current sync status (runs the staleness sweep first).
    Status,
    /// Request cooperative cancellation of the running sync.
    Cancel,
    /// List skipped-order diagnostics.
    Skips {
        /// Filter by reason code (e.g. fetch_error, db_upsert_failed).
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// List recent sync run summaries.
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = tracelot_core::load_app_config().context("loading configuration")?;
    init_tracing(&config);

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync {
            start_date,
            days,
            max_orders,
            throttle_secs,
        } => run_sync(&config, start_date, days, max_orders, throttle_secs, false).await,
        Commands::Rebuild { confirm } => {
            if !confirm {
                anyhow::bail!(
                    "rebuild archives and deletes every sync-sourced row before re-syncing; \
                     pass --confirm to proceed"
                );
            }
            run_sync(&config, None, None, None, None, true).await
        }
        Commands::Status => show_status(&config).await,
        Commands::Cancel => request_cancel(&config).await,
        Commands::Skips { reason, limit } => list_skips(&config, reason.as_deref(), limit).await,
        Commands::Runs { limit } => list_runs(&config, limit).await,
        Commands::Migrate => migrate(&config).await,
    }
}

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    tracelot_db::connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .context("connecting to database")
}

async fn run_sync(
    config: &AppConfig,
    start_date: Option<NaiveDate>,
    days: Option<i64>,
    max_orders: Option<u32>,
    throttle_secs: Option<u64>,
    rebuild: bool,
) -> anyhow::Result<()> {
    // Fail fast on missing credentials before any network or DB activity.
    let (Some(api_key), Some(api_secret)) = (
        config.shipstation_api_key.as_deref(),
        config.shipstation_api_secret.as_deref(),
    ) else {
        return Err(SyncError::MissingCredentials).context(
            "set TRACELOT_SHIPSTATION_API_KEY and TRACELOT_SHIPSTATION_API_SECRET",
        );
    };

    let throttle = throttle_secs.unwrap_or(config.sync_throttle_secs);
    let client = ShipstationClient::new(
        api_key,
        api_secret,
        config.shipstation_list_timeout_secs,
        config.shipstation_detail_timeout_secs,
        config.shipstation_max_attempts,
        throttle,
    )
    .context("building ShipStation client")?;

    let pool = connect(config).await?;
    let directory = PgCustomerDirectory::new(pool.clone());
    let progress = PgProgressSink::new(pool.clone());

    let options = SyncOptions {
        start_date,
        window_days: days.unwrap_or(config.sync_window_days),
        max_orders: max_orders.unwrap_or(config.sync_max_orders),
        throttle_secs: throttle,
        lot_log_path: config.lot_log_path.clone(),
    };

    let outcome = if rebuild {
        // A rebuild leaves the ledger empty until the re-sync completes, so
        // it runs to completion without a cancellation probe.
        let cancel = NeverCancel;
        let engine = SyncEngine::new(
            &pool,
            &client,
            &directory,
            &progress,
            &cancel,
            config.default_rep_id,
        );
        archive_and_rebuild(&pool, &engine, &options).await?
    } else {
        let cancel = PgCancelProbe::new(pool.clone());
        let engine = SyncEngine::new(
            &pool,
            &client,
            &directory,
            &progress,
            &cancel,
            config.default_rep_id,
        );
        engine.run(&options).await?
    };

    println!("{}", outcome.message);
    Ok(())
}

async fn show_status(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    tracelot_db::health_check(&pool)
        .await
        .context("database health check")?;
    if tracelot_db::mark_stale_if_quiet(&pool, STALE_AFTER_SECS).await? {
        println!("note: a quiet running status was reclassified as stale");
    }
    let status = tracelot_db::get_sync_status(&pool).await?;
    println!("status:        {}", status.status);
    println!("message:       {}", status.message);
    println!("synced:        {}", status.synced);
    println!("skipped:       {}", status.skipped);
    println!("current page:  {}", status.current_page);
    if let Some(started) = status.started_at {
        println!("started:       {started}");
    }
    println!("updated:       {}", status.updated_at);
    if let Some(error) = &status.error_message {
        println!("error:         {error}");
    }
    if status.cancel_requested {
        println!("cancel:        requested");
    }
    Ok(())
}

async fn request_cancel(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    if tracelot_db::request_cancel(&pool).await? {
        println!("cancellation requested; the run stops at the next page or shipment boundary");
    } else {
        println!("no sync is currently running");
    }
    Ok(())
}

async fn list_skips(config: &AppConfig, reason: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let rows = tracelot_db::list_skipped_orders(&pool, reason, limit).await?;
    if rows.is_empty() {
        println!("no skipped orders recorded");
        return Ok(());
    }
    for row in rows {
        println!(
            "{}\t{}\t{}\t{}",
            row.shipstation_order_id,
            row.order_number.as_deref().unwrap_or("-"),
            row.reason,
            serde_json::to_string(&row.details).unwrap_or_default()
        );
    }
    Ok(())
}

async fn list_runs(config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let rows = tracelot_db::list_sync_runs(&pool, limit).await?;
    if rows.is_empty() {
        println!("no sync runs recorded");
        return Ok(());
    }
    for row in rows {
        println!(
            "{}\tsynced {}\tskipped {}\torders {}\tshipments {}\t{}s\t{}",
            row.created_at,
            row.synced,
            row.skipped,
            row.orders_seen,
            row.shipments_seen,
            row.duration_secs,
            row.message
        );
    }
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let applied = tracelot_db::run_migrations(&pool)
        .await
        .context("running migrations")?;
    println!("applied {applied} migration(s)");
    Ok(())
}
