//! polyscout
//!
//! A paper-trading scaffold for binary-outcome prediction markets: it ingests
//! market quotes, estimates a fair probability for each market from external
//! signals, detects positive-edge opportunities, sizes them via fractional
//! Kelly with hard caps, and records every decision through a stub exchange
//! and an append-only sqlite log.

pub mod common;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod models;
pub mod runner;
pub mod sources;
pub mod storage;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::types::{
    DecisionRecord, FairValueEstimate, Fill, Market, MarketSnapshot, Opportunity, Side, SizedOrder,
};
pub use config::{load_config, AppConfig, ExchangeKind, TradingMode};
pub use engine::{
    detect, kelly_fraction, passes_liquidity_gate, size, CycleExposure, ExposureView, SizingCaps,
    SizingParams,
};
pub use exchange::{BoxedExchange, Exchange, PaperExchange, PolymarketPublicExchange};
pub use models::{
    BaselineModel, BoxedFairValueModel, FairValueModel, FairValueRouter,
};
pub use runner::{build_runner, CycleReport, Runner};
pub use storage::DecisionStore;
