//! Opportunity detection: fair value vs. market-implied price

use rust_decimal::Decimal;

use crate::common::errors::{EngineError, Result};
use crate::common::types::{FairValueEstimate, MarketSnapshot, Opportunity, Side};

fn check_unit_interval(name: &str, market_id: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(EngineError::InvalidMarketData(format!(
            "{} for {} out of [0,1]: {}",
            name, market_id, value
        )));
    }
    Ok(())
}

/// Compare a snapshot's implied prices against a fair-value estimate.
///
/// Computes the signed edge on both sides, picks the side with the larger
/// absolute edge (YES on an exact tie), and emits an [`Opportunity`] only when
/// that absolute edge meets `min_edge`.
///
/// Pure function of its inputs. Out-of-range prices or probabilities are
/// rejected rather than clamped; the caller decides whether to skip the market
/// or abort the cycle.
pub fn detect(
    snapshot: &MarketSnapshot,
    fair_value: &FairValueEstimate,
    min_edge: Decimal,
) -> Result<Option<Opportunity>> {
    check_unit_interval("yes_price", &snapshot.market_id, snapshot.yes_price)?;
    check_unit_interval("no_price", &snapshot.market_id, snapshot.no_price)?;
    check_unit_interval("fair value", &snapshot.market_id, fair_value.probability)?;

    let edge_yes = fair_value.probability - snapshot.yes_price;
    let edge_no = (Decimal::ONE - fair_value.probability) - snapshot.no_price;

    // Exact tie in absolute edge prefers YES.
    let (side, edge) = if edge_no.abs() > edge_yes.abs() {
        (Side::No, edge_no)
    } else {
        (Side::Yes, edge_yes)
    };

    if edge.abs() < min_edge {
        return Ok(None);
    }

    Ok(Some(Opportunity {
        market_id: snapshot.market_id.clone(),
        side,
        edge,
    }))
}

/// Liquidity gate: markets with known liquidity below the floor are skipped.
///
/// Unknown liquidity passes; the figure is an optional filter, not a hard
/// invariant.
pub fn passes_liquidity_gate(snapshot: &MarketSnapshot, min_liquidity_usd: Decimal) -> bool {
    match snapshot.liquidity_usd {
        Some(liquidity) => liquidity >= min_liquidity_usd,
        None => true,
    }
}
