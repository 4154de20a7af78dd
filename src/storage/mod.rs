//! Append-only decision log backed by sqlite
//!
//! One row per market per evaluation cycle, keyed `(market_id, cycle_ts)`.
//! Rows are never updated or deleted by the engine; retention is an external
//! concern. Decimals and timestamps are stored as TEXT so a fetched record
//! reproduces the written one exactly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration as StdDuration;
use tracing::warn;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    DecisionRecord, FairValueEstimate, Fill, MarketSnapshot, Opportunity, Side, SizedOrder,
};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS decisions (
    market_id      TEXT NOT NULL,
    cycle_ts       TEXT NOT NULL,
    question       TEXT NOT NULL,
    yes_price      TEXT NOT NULL,
    no_price       TEXT NOT NULL,
    liquidity_usd  TEXT,
    snapshot_ts    TEXT NOT NULL,
    fv_probability TEXT NOT NULL,
    fv_confidence  TEXT,
    fv_rationale   TEXT,
    opp_side       TEXT,
    opp_edge       TEXT,
    order_stake    TEXT,
    fill_price     TEXT,
    fill_ts        TEXT,
    PRIMARY KEY (market_id, cycle_ts)
)
"#;

const INSERT_DECISION: &str = r#"
INSERT INTO decisions (
    market_id, cycle_ts, question, yes_price, no_price, liquidity_usd,
    snapshot_ts, fv_probability, fv_confidence, fv_rationale,
    opp_side, opp_edge, order_stake, fill_price, fill_ts
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_DECISION: &str = r#"
SELECT market_id, cycle_ts, question, yes_price, no_price, liquidity_usd,
       snapshot_ts, fv_probability, fv_confidence, fv_rationale,
       opp_side, opp_edge, order_stake, fill_price, fill_ts
FROM decisions WHERE market_id = ? AND cycle_ts = ?
"#;

/// How many times a failed write is retried before the cycle is aborted
const WRITE_ATTEMPTS: u32 = 3;

/// Durable, append-only store of [`DecisionRecord`]s
pub struct DecisionStore {
    pool: SqlitePool,
}

impl DecisionStore {
    /// Open (creating if missing) the sqlite file at `path`
    pub async fn open(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(EngineError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// In-memory store, for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Persist one decision, retrying a bounded number of times.
    ///
    /// The cycle for a market is not complete until this returns Ok; after
    /// the final attempt the failure is escalated as [`EngineError::Persistence`].
    pub async fn record(&self, record: &DecisionRecord) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.insert(record).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        market_id = %record.market_id,
                        attempt,
                        error = %e,
                        "decision write failed"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(StdDuration::from_millis(50 * attempt as u64)).await;
                }
            }
        }
        Err(EngineError::Persistence(format!(
            "decision for {} not recorded after {} attempts: {}",
            record.market_id,
            WRITE_ATTEMPTS,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn insert(&self, record: &DecisionRecord) -> Result<()> {
        sqlx::query(INSERT_DECISION)
            .bind(&record.market_id)
            .bind(record.cycle_ts.to_rfc3339())
            .bind(&record.snapshot.question)
            .bind(record.snapshot.yes_price.to_string())
            .bind(record.snapshot.no_price.to_string())
            .bind(record.snapshot.liquidity_usd.map(|d| d.to_string()))
            .bind(record.snapshot.timestamp.to_rfc3339())
            .bind(record.fair_value.probability.to_string())
            .bind(record.fair_value.confidence.map(|d| d.to_string()))
            .bind(record.fair_value.rationale.clone())
            .bind(record.opportunity.as_ref().map(|o| o.side.to_string()))
            .bind(record.opportunity.as_ref().map(|o| o.edge.to_string()))
            .bind(record.order.as_ref().map(|o| o.stake.to_string()))
            .bind(record.fill.as_ref().map(|f| f.fill_price.to_string()))
            .bind(record.fill.as_ref().map(|f| f.timestamp.to_rfc3339()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read back one decision row, exactly as written
    pub async fn fetch(
        &self,
        market_id: &str,
        cycle_ts: DateTime<Utc>,
    ) -> Result<Option<DecisionRecord>> {
        let row = sqlx::query(SELECT_DECISION)
            .bind(market_id)
            .bind(cycle_ts.to_rfc3339())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    /// Total number of recorded decisions
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM decisions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| EngineError::Persistence(format!("stored decimal {:?}: {}", raw, e)))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Persistence(format!("stored timestamp {:?}: {}", raw, e)))
}

fn parse_side(raw: &str) -> Result<Side> {
    match raw {
        "YES" => Ok(Side::Yes),
        "NO" => Ok(Side::No),
        other => Err(EngineError::Persistence(format!(
            "stored side {:?} not recognized",
            other
        ))),
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionRecord> {
    let market_id: String = row.try_get("market_id")?;
    let cycle_ts = parse_timestamp(&row.try_get::<String, _>("cycle_ts")?)?;

    let snapshot = MarketSnapshot {
        market_id: market_id.clone(),
        question: row.try_get("question")?,
        yes_price: parse_decimal(&row.try_get::<String, _>("yes_price")?)?,
        no_price: parse_decimal(&row.try_get::<String, _>("no_price")?)?,
        liquidity_usd: row
            .try_get::<Option<String>, _>("liquidity_usd")?
            .map(|s| parse_decimal(&s))
            .transpose()?,
        timestamp: parse_timestamp(&row.try_get::<String, _>("snapshot_ts")?)?,
    };

    let fair_value = FairValueEstimate {
        probability: parse_decimal(&row.try_get::<String, _>("fv_probability")?)?,
        confidence: row
            .try_get::<Option<String>, _>("fv_confidence")?
            .map(|s| parse_decimal(&s))
            .transpose()?,
        rationale: row.try_get("fv_rationale")?,
    };

    let opportunity = match (
        row.try_get::<Option<String>, _>("opp_side")?,
        row.try_get::<Option<String>, _>("opp_edge")?,
    ) {
        (Some(side), Some(edge)) => Some(Opportunity {
            market_id: market_id.clone(),
            side: parse_side(&side)?,
            edge: parse_decimal(&edge)?,
        }),
        _ => None,
    };

    let order = match (&opportunity, row.try_get::<Option<String>, _>("order_stake")?) {
        (Some(opp), Some(stake)) => Some(SizedOrder {
            market_id: market_id.clone(),
            side: opp.side,
            stake: parse_decimal(&stake)?,
        }),
        _ => None,
    };

    let fill = match (
        &order,
        row.try_get::<Option<String>, _>("fill_price")?,
        row.try_get::<Option<String>, _>("fill_ts")?,
    ) {
        (Some(order), Some(price), Some(ts)) => Some(Fill {
            market_id: market_id.clone(),
            side: order.side,
            stake: order.stake,
            fill_price: parse_decimal(&price)?,
            timestamp: parse_timestamp(&ts)?,
        }),
        _ => None,
    };

    Ok(DecisionRecord {
        market_id,
        cycle_ts,
        snapshot,
        fair_value,
        opportunity,
        order,
        fill,
    })
}
