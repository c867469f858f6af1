//! The cycle scheduler.
//!
//! One scheduler instance owns one [`CycleState`] and drives cycles
//! sequentially:
//!
//! 1. exit pre-check on open positions
//! 2. every Nth cycle, detached outcome tracking (single slot)
//! 3. signal aggregation
//! 4. prediction gate
//! 5. admission / execution
//! 6. every Mth cycle, a summary notification
//!
//! A failing cycle is logged and notified; the loop keeps going until a
//! stop is requested.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::exchange::Ledger;
use crate::notify::Notifier;
use crate::persistence::OutcomeTracker;
use crate::signals::{AggregatedDecision, SignalAggregator};
use crate::strategy::{PositionLifecycleManager, Prediction, PredictionGate};

use super::clock::MarketClock;
use super::commands::{CommandSource, OperatorCommand};
use super::state::{CycleState, StatusReport};

/// Collaborators the scheduler uses directly.
pub struct SchedulerServices {
    pub ledger: Arc<dyn Ledger>,
    pub notifier: Arc<dyn Notifier>,
    pub outcomes: Arc<dyn OutcomeTracker>,
    pub clock: Arc<dyn MarketClock>,
}

/// Cloneable access to a running scheduler: stop requests and status.
#[derive(Clone)]
pub struct SchedulerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    state: Arc<RwLock<CycleState>>,
    ledger: Arc<dyn Ledger>,
}

impl SchedulerHandle {
    /// Request a cooperative stop; the current cycle finishes first.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub async fn status(&self) -> StatusReport {
        let state = self.state.read().await.clone();

        let open_positions = match self.ledger.open_positions_summary().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "Status: open positions unavailable");
                Vec::new()
            }
        };
        let performance = match self.ledger.performance_summary().await {
            Ok(perf) => Some(perf),
            Err(e) => {
                warn!(error = %e, "Status: performance unavailable");
                None
            }
        };

        StatusReport {
            running: state.running,
            uptime_seconds: state.uptime_seconds(Utc::now()),
            cycle_count: state.cycle_count,
            prediction_count: state.prediction_count,
            last_prediction: state.last_prediction,
            open_positions,
            account_balance: performance.as_ref().map(|p| p.account_balance),
            performance,
        }
    }
}

/// Clears the maintenance slot when the task ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    symbol: String,
    cycle_interval: Duration,
    market_closed_poll: Duration,
    summary_every: u64,
    maintenance_every: u64,
    aggregator: SignalAggregator,
    gate: PredictionGate,
    lifecycle: PositionLifecycleManager,
    services: SchedulerServices,
    state: Arc<RwLock<CycleState>>,
    stop_tx: Arc<watch::Sender<bool>>,
    maintenance_in_flight: Arc<AtomicBool>,
    commands: Option<Arc<Mutex<Box<dyn CommandSource>>>>,
}

impl Scheduler {
    pub fn new(
        symbol: impl Into<String>,
        schedule: &ScheduleConfig,
        aggregator: SignalAggregator,
        gate: PredictionGate,
        lifecycle: PositionLifecycleManager,
        services: SchedulerServices,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            symbol: symbol.into(),
            cycle_interval: Duration::from_secs(schedule.cycle_interval_secs),
            market_closed_poll: Duration::from_secs(schedule.market_closed_poll_secs),
            summary_every: schedule.summary_every_cycles.max(1),
            maintenance_every: schedule.maintenance_every_cycles.max(1),
            aggregator,
            gate,
            lifecycle,
            services,
            state: Arc::new(RwLock::new(CycleState::default())),
            stop_tx: Arc::new(stop_tx),
            maintenance_in_flight: Arc::new(AtomicBool::new(false)),
            commands: None,
        }
    }

    /// Listen for operator commands while running. The source is kept
    /// across runs, so a restarted scheduler listens again.
    pub fn with_command_source(mut self, source: Box<dyn CommandSource>) -> Self {
        self.commands = Some(Arc::new(Mutex::new(source)));
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stop_tx: self.stop_tx.clone(),
            state: self.state.clone(),
            ledger: self.services.ledger.clone(),
        }
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    pub async fn status(&self) -> StatusReport {
        self.handle().status().await
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.running
    }

    /// Run cycles until a stop is requested.
    ///
    /// Calling `run` while already running logs a warning and returns.
    pub async fn run(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.running {
                warn!("⚠️  [SCHEDULER] Already running, ignoring start request");
                return Ok(());
            }
            state.start(Utc::now());
        }

        let mut stop_rx = self.stop_tx.subscribe();
        info!(
            symbol = %self.symbol,
            interval_secs = self.cycle_interval.as_secs(),
            threshold = self.gate.threshold(),
            trading = self.lifecycle.trading_enabled(),
            "🚀 [SCHEDULER] Started"
        );

        let listener = self.spawn_listener();

        while !*stop_rx.borrow() {
            let wait = if self.services.clock.is_open(Utc::now()) {
                self.run_cycle().await;
                self.cycle_interval
            } else {
                debug!(
                    "🌙 [SCHEDULER] Market closed, rechecking in {}s",
                    self.market_closed_poll.as_secs()
                );
                self.market_closed_poll
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(listener) = listener {
            listener.abort();
            let _ = listener.await;
        }

        let cycles = {
            let mut state = self.state.write().await;
            state.stop();
            state.cycle_count
        };
        self.stop_tx.send_replace(false);
        info!("🛑 [SCHEDULER] Stopped after {} cycles", cycles);
        Ok(())
    }

    fn spawn_listener(&self) -> Option<JoinHandle<()>> {
        let source = self.commands.clone()?;
        let handle = self.handle();
        let notifier = self.services.notifier.clone();

        Some(tokio::spawn(async move {
            let mut source = source.lock().await;
            while let Some(command) = source.next_command().await {
                match command {
                    OperatorCommand::Status => {
                        let report = handle.status().await;
                        notifier.send(&report.to_string()).await;
                    }
                    OperatorCommand::Stop => {
                        info!("🛑 [SCHEDULER] Stop requested by operator");
                        handle.stop();
                    }
                }
            }
            debug!("Command source closed");
        }))
    }

    /// One cycle with errors contained at the boundary.
    async fn run_cycle(&self) {
        let cycle = self.state.read().await.cycle_count + 1;
        info!("🔄 [CYCLE] #{} starting", cycle);
        let started = std::time::Instant::now();

        if let Err(e) = self.cycle(cycle).await {
            error!(cycle, "❌ [CYCLE] #{} failed: {:#}", cycle, e);
            self.services
                .notifier
                .send(&format!("Cycle #{} error: {:#}", cycle, e))
                .await;
        }

        self.state.write().await.cycle_count = cycle;
        debug!("⏱️  Cycle #{} took {}ms", cycle, started.elapsed().as_millis());
    }

    async fn cycle(&self, cycle: u64) -> Result<()> {
        self.lifecycle
            .check_exits()
            .await
            .context("exit pre-check failed")?;

        if cycle % self.maintenance_every == 0 {
            self.dispatch_maintenance();
        }

        let decision = self.aggregator.aggregate(&self.symbol).await;

        let prediction = match &decision {
            Some(d) => {
                let capital = self
                    .services
                    .ledger
                    .performance_summary()
                    .await
                    .context("account balance unavailable")?
                    .account_balance;
                self.gate.gate(d, capital).await
            }
            None => None,
        };

        if let Some(p) = &prediction {
            self.state.write().await.record_prediction(p.clone());
            let outcome = self.lifecycle.admit(p).await.context("admission failed")?;
            info!(prediction_id = %p.prediction_id, %outcome, "🎯 [CYCLE] Prediction handled");
        }

        if cycle % self.summary_every == 0 {
            self.send_summary(cycle, decision.as_ref(), prediction.as_ref())
                .await?;
        }

        Ok(())
    }

    /// Start outcome tracking unless a previous run is still going.
    fn dispatch_maintenance(&self) {
        if self.maintenance_in_flight.swap(true, Ordering::SeqCst) {
            warn!("🧹 [MAINT] Outcome tracking still running, skipping this round");
            return;
        }

        let slot = InFlight(self.maintenance_in_flight.clone());
        let outcomes = self.services.outcomes.clone();
        tokio::spawn(async move {
            let _slot = slot;
            match outcomes.track_outcomes().await {
                Ok(n) => info!("🧹 [MAINT] Processed {} trade outcomes", n),
                Err(e) => warn!(error = %e, "🧹 [MAINT] Outcome tracking failed"),
            }
        });
    }

    async fn send_summary(
        &self,
        cycle: u64,
        decision: Option<&AggregatedDecision>,
        prediction: Option<&Prediction>,
    ) -> Result<()> {
        let ledger = &self.services.ledger;
        let perf = ledger.performance_summary().await?;
        let open = ledger.open_positions_summary().await?;
        let predictions = self.state.read().await.prediction_count;

        let decision_text = decision
            .map(|d| format!("{} {:.0}%", d.direction, d.confidence * 100.0))
            .unwrap_or_else(|| "no signal".to_string());
        let prediction_text = prediction
            .map(|p| p.headline())
            .unwrap_or_else(|| "none".to_string());

        let text = format!(
            "Cycle #{} | {} | decision: {} | prediction: {} | {} predictions total | {} open | balance ${:.2} | win rate {:.1}%",
            cycle,
            self.symbol,
            decision_text,
            prediction_text,
            predictions,
            open.len(),
            perf.account_balance,
            perf.win_rate * Decimal::ONE_HUNDRED,
        );
        self.services.notifier.send(&text).await;
        Ok(())
    }
}
