//! Options Signal Trader - Main Entry Point
//!
//! Runs the decision cycle against HTTP signal analyzers and an HTTP
//! option chain, with a paper ledger and SQLite signal tracking.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use options_signal_trader::config::Config;
use options_signal_trader::exchange::{HttpChainSource, Ledger, OptionChainSource, PaperLedger};
use options_signal_trader::notify::{LogNotifier, Notifier, WebhookNotifier};
use options_signal_trader::persistence::SqliteSignalStore;
use options_signal_trader::scheduler::{
    ExchangeHours, Scheduler, SchedulerServices, StdinCommandSource,
};
use options_signal_trader::signals::{HttpAnalyzer, SignalAdapter, SignalAggregator};
use options_signal_trader::strategy::{
    ChainContractSelector, PositionLifecycleManager, PredictionGate,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Options Signal Trader CLI
#[derive(Parser)]
#[command(name = "options-trader")]
#[command(version, about = "Signal-aggregating options trader")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision scheduler (default)
    Run,

    /// Show tracked predictions and signal effectiveness
    Status {
        /// Path to SQLite database
        #[arg(short, long, default_value = "data/signals.db")]
        db: String,
    },

    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Status { db }) => return show_status(&db),
        Some(Commands::CheckConfig) => {
            let config = Config::load()?;
            config.validate()?;
            log_config(&config);
            info!("✅ Configuration is valid");
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║        Options Signal Trader v{} - Paper Ledger         ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    if config.trading.enabled {
        warn!("⚠️  Trading ENABLED - predictions will open paper positions");
    } else {
        info!("📝 Prediction-only mode - no positions will be opened");
    }

    let scheduler = build_scheduler(&config)?;
    let handle = scheduler.handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        handle.stop();
    });

    info!("🚀 Starting decision loop... (type 'status' or 'stop')");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    scheduler.run().await?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🏁 Final Statistics:");
    let status = scheduler.status().await;
    for line in status.to_string().lines() {
        info!("   {}", line);
    }
    info!("👋 Options Signal Trader shutdown complete");
    Ok(())
}

/// Wire the HTTP collaborators, paper ledger and tracking store.
fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let timeout = Duration::from_secs(config.schedule.signal_timeout_secs);

    let adapters = config
        .signals
        .iter()
        .map(|spec| {
            let analyzer = HttpAnalyzer::new(&spec.url, timeout)?;
            Ok(SignalAdapter::new(
                &spec.name,
                spec.weight,
                spec.category,
                timeout,
                Arc::new(analyzer),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    let aggregator = SignalAggregator::new(adapters, config.aggregation.clone());
    info!("📡 [INIT] {} signal adapters ready", aggregator.signal_names().len());

    let chain: Arc<dyn OptionChainSource> = Arc::new(HttpChainSource::new(&config.chain.url)?);
    let ledger: Arc<dyn Ledger> = Arc::new(PaperLedger::new(
        config.trading.initial_capital,
        config.selection.commission_per_contract,
        chain.clone(),
    ));

    let store = Arc::new(
        SqliteSignalStore::new(&config.persistence.db_path)
            .with_context(|| format!("Failed to open {}", config.persistence.db_path))?,
    );
    info!("💾 [INIT] Signal tracking at {}", config.persistence.db_path);

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => {
            info!("📣 [INIT] Webhook notifications enabled");
            Arc::new(WebhookNotifier::new(url)?)
        }
        None => Arc::new(LogNotifier),
    };

    let selector = ChainContractSelector::new(
        &config.underlying,
        config.selection.clone(),
        chain,
    );
    let gate = PredictionGate::new(
        config.trading.confidence_threshold,
        &config.strategy_id,
        aggregator.signal_names(),
        Arc::new(selector),
        store.clone(),
    );
    let lifecycle = PositionLifecycleManager::new(
        config.trading.enabled,
        config.trading.max_open_positions,
        ledger.clone(),
        notifier.clone(),
        store.clone(),
    );

    let scheduler = Scheduler::new(
        &config.underlying,
        &config.schedule,
        aggregator,
        gate,
        lifecycle,
        SchedulerServices {
            ledger,
            notifier,
            outcomes: store,
            clock: Arc::new(ExchangeHours::from_config(&config.market)?),
        },
    )
    .with_command_source(Box::new(StdinCommandSource::stdin()));

    Ok(scheduler)
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "options-trader.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("options_signal_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Underlying: {}", config.underlying);
    info!("   Strategy: {}", config.strategy_id);
    info!(
        "   Confidence Threshold: {:.0}%",
        config.trading.confidence_threshold * 100.0
    );
    info!("   Max Open Positions: {}", config.trading.max_open_positions);
    info!(
        "   Cycle Interval: {}m (market closed poll {}m)",
        config.schedule.cycle_interval_secs / 60,
        config.schedule.market_closed_poll_secs / 60
    );
    info!(
        "   Market Hours: {}-{} {}",
        config.market.open, config.market.close, config.market.timezone
    );
    info!(
        "   Contracts: DTE {}-{}, |delta| {:.2} ± {:.2}",
        config.selection.min_days_to_expiry,
        config.selection.max_days_to_expiry,
        config.selection.target_delta,
        config.selection.delta_tolerance
    );
    for signal in &config.signals {
        info!("   Signal {:<16} weight {:.2}", signal.name, signal.weight);
    }
}

/// Print tracked predictions and per-signal effectiveness.
fn show_status(db_path: &str) -> Result<()> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              SIGNAL TRACKING STATUS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Database not found: {}", db_path);
        println!("   The trader has not been started yet, or the database path is incorrect.");
        return Ok(());
    }

    let store = SqliteSignalStore::new(db_path)?;
    let stats = store.stats()?;

    println!("\n📈 Activity");
    println!("   ├─ Tracked Predictions: {}", stats.predictions);
    println!("   └─ Closed Outcomes:     {}", stats.outcomes);

    if stats.effectiveness.is_empty() {
        println!("\n   No signal effectiveness computed yet.");
        return Ok(());
    }

    println!("\n🎯 Signal Effectiveness");
    for e in &stats.effectiveness {
        println!(
            "   ├─ {:<16} {:>4} preds | agreed {:>4} | wins {:>4} | hit rate {:>5.1}%",
            e.signal_name,
            e.predictions,
            e.agreed,
            e.agreed_wins,
            e.hit_rate * 100.0
        );
    }

    Ok(())
}
