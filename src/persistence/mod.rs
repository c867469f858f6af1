//! SQLite persistence for signal tracking.
//!
//! Records, per accepted prediction:
//! - each configured signal's direction and confidence
//! - the realized outcome once the ledger closes the position
//! - periodically recomputed per-signal effectiveness

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::exchange::ExitEvent;
use crate::signals::Direction;

/// One signal's contribution to a prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedSignal {
    pub name: String,
    pub direction: Direction,
    pub confidence: f64,
}

/// Records which signals backed each prediction, and how it ended.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalTracker: Send + Sync {
    /// Record every signal's contribution to an accepted prediction.
    async fn track(
        &self,
        prediction_id: &str,
        traded_direction: Direction,
        signals: &[TrackedSignal],
        strategy_id: &str,
    ) -> Result<()>;

    /// Record the realized result of a closed prediction.
    async fn record_outcome(&self, event: &ExitEvent) -> Result<()>;
}

/// Periodic outcome processing, run as a detached maintenance task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutcomeTracker: Send + Sync {
    /// Process newly recorded outcomes; returns how many were processed.
    async fn track_outcomes(&self) -> Result<usize>;
}

/// Per-signal hit statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalEffectiveness {
    pub signal_name: String,
    /// Closed predictions the signal was recorded for
    pub predictions: u64,
    /// Of those, how many it agreed with the traded direction
    pub agreed: u64,
    /// Agreed and the trade was profitable
    pub agreed_wins: u64,
    pub hit_rate: f64,
}

/// Summary for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingStats {
    pub predictions: u64,
    pub outcomes: u64,
    pub effectiveness: Vec<SignalEffectiveness>,
}

/// SQLite-backed signal tracking store.
pub struct SqliteSignalStore {
    conn: Mutex<Connection>,
}

impl SqliteSignalStore {
    /// Open (or create) the database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Signal store initialized at {:?}", path);
        Ok(store)
    }

    /// In-memory store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("signal store connection poisoned"))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS signal_contributions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prediction_id TEXT NOT NULL,
                strategy_id TEXT NOT NULL,
                signal_name TEXT NOT NULL,
                direction TEXT NOT NULL,
                confidence REAL NOT NULL,
                traded_direction TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                UNIQUE (prediction_id, signal_name)
            );
            CREATE INDEX IF NOT EXISTS idx_contrib_prediction ON signal_contributions(prediction_id);

            CREATE TABLE IF NOT EXISTS trade_outcomes (
                prediction_id TEXT PRIMARY KEY,
                contract_symbol TEXT NOT NULL,
                reason TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                realized_pnl_pct TEXT NOT NULL,
                is_win INTEGER NOT NULL,
                closed_at TEXT NOT NULL,
                processed INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS signal_effectiveness (
                signal_name TEXT PRIMARY KEY,
                predictions INTEGER NOT NULL,
                agreed INTEGER NOT NULL,
                agreed_wins INTEGER NOT NULL,
                hit_rate REAL NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Record signal contributions for one prediction.
    pub fn save_contributions(
        &self,
        prediction_id: &str,
        traded_direction: Direction,
        signals: &[TrackedSignal],
        strategy_id: &str,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for signal in signals {
            tx.execute(
                r#"INSERT OR REPLACE INTO signal_contributions
                   (prediction_id, strategy_id, signal_name, direction, confidence, traded_direction, recorded_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    prediction_id,
                    strategy_id,
                    signal.name,
                    signal.direction.as_str(),
                    signal.confidence,
                    traded_direction.as_str(),
                    now,
                ],
            )?;
        }
        tx.commit()?;
        debug!(%prediction_id, signals = signals.len(), "Signal contributions saved");
        Ok(())
    }

    /// Record a closed position's result.
    pub fn save_outcome(&self, event: &ExitEvent) -> Result<()> {
        self.conn()?.execute(
            r#"INSERT OR REPLACE INTO trade_outcomes
               (prediction_id, contract_symbol, reason, realized_pnl, realized_pnl_pct, is_win, closed_at, processed)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)"#,
            params![
                event.prediction_id,
                event.contract_symbol,
                event.reason.to_string(),
                event.realized_pnl.to_string(),
                event.realized_pnl_pct.to_string(),
                event.is_win(),
                event.closed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Recompute per-signal effectiveness and mark outcomes processed.
    pub fn refresh_effectiveness(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let pending: usize = tx.query_row(
            "SELECT COUNT(*) FROM trade_outcomes WHERE processed = 0",
            [],
            |row| row.get::<_, i64>(0),
        )? as usize;

        let rows: Vec<(String, i64, i64, i64)> = {
            let mut stmt = tx.prepare(
                r#"SELECT c.signal_name,
                          COUNT(*),
                          SUM(CASE WHEN c.direction = c.traded_direction THEN 1 ELSE 0 END),
                          SUM(CASE WHEN c.direction = c.traded_direction AND o.is_win = 1 THEN 1 ELSE 0 END)
                   FROM signal_contributions c
                   JOIN trade_outcomes o ON o.prediction_id = c.prediction_id
                   GROUP BY c.signal_name
                   ORDER BY c.signal_name"#,
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            mapped.collect::<rusqlite::Result<_>>()?
        };

        let now = Utc::now().to_rfc3339();
        for (name, predictions, agreed, agreed_wins) in &rows {
            let hit_rate = if *agreed > 0 {
                *agreed_wins as f64 / *agreed as f64
            } else {
                0.0
            };
            tx.execute(
                r#"INSERT OR REPLACE INTO signal_effectiveness
                   (signal_name, predictions, agreed, agreed_wins, hit_rate, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![name, predictions, agreed, agreed_wins, hit_rate, now],
            )?;
        }

        tx.execute("UPDATE trade_outcomes SET processed = 1 WHERE processed = 0", [])?;
        tx.commit()?;
        Ok(pending)
    }

    pub fn effectiveness(&self) -> Result<Vec<SignalEffectiveness>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT signal_name, predictions, agreed, agreed_wins, hit_rate
               FROM signal_effectiveness ORDER BY signal_name"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SignalEffectiveness {
                signal_name: row.get(0)?,
                predictions: row.get::<_, i64>(1)? as u64,
                agreed: row.get::<_, i64>(2)? as u64,
                agreed_wins: row.get::<_, i64>(3)? as u64,
                hit_rate: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn stats(&self) -> Result<TrackingStats> {
        let (predictions, outcomes) = {
            let conn = self.conn()?;
            let predictions: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT prediction_id) FROM signal_contributions",
                [],
                |row| row.get(0),
            )?;
            let outcomes: i64 =
                conn.query_row("SELECT COUNT(*) FROM trade_outcomes", [], |row| row.get(0))?;
            (predictions as u64, outcomes as u64)
        };

        Ok(TrackingStats {
            predictions,
            outcomes,
            effectiveness: self.effectiveness()?,
        })
    }
}

#[async_trait]
impl SignalTracker for SqliteSignalStore {
    async fn track(
        &self,
        prediction_id: &str,
        traded_direction: Direction,
        signals: &[TrackedSignal],
        strategy_id: &str,
    ) -> Result<()> {
        self.save_contributions(prediction_id, traded_direction, signals, strategy_id)
    }

    async fn record_outcome(&self, event: &ExitEvent) -> Result<()> {
        self.save_outcome(event)
    }
}

#[async_trait]
impl OutcomeTracker for SqliteSignalStore {
    async fn track_outcomes(&self) -> Result<usize> {
        self.refresh_effectiveness()
    }
}
