//! Exchange adapters - market listing, quotes and (paper) order placement

pub mod paper;
pub mod polymarket;

use async_trait::async_trait;

use crate::common::errors::Result;
use crate::common::types::{Fill, Market, MarketSnapshot, SizedOrder};

pub use paper::PaperExchange;
pub use polymarket::PolymarketPublicExchange;

/// Unified interface over market-data/quote sources.
///
/// `list_markets` may refresh adapter-internal metadata (token ids,
/// liquidity) that later `get_quotes` calls rely on, hence `&mut self`.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Name of the adapter, for logs
    fn name(&self) -> &'static str;

    /// Fetch the current set of tradable markets, capped at `limit`
    async fn list_markets(&mut self, limit: usize) -> Result<Vec<Market>>;

    /// Fetch current snapshots for the given markets. Markets without a
    /// usable quote are omitted, not errored.
    async fn get_quotes(&self, market_ids: &[String]) -> Result<Vec<MarketSnapshot>>;

    /// Place a sized order against the current snapshot.
    ///
    /// Returns `None` for zero-stake orders; otherwise the stub fills the
    /// entire stake at the snapshot's quoted price for the chosen side.
    async fn place_order(
        &self,
        order: &SizedOrder,
        snapshot: &MarketSnapshot,
    ) -> Result<Option<Fill>>;
}

/// Boxed exchange for runtime adapter selection
pub type BoxedExchange = Box<dyn Exchange>;
