//! Daily portfolio P&L reconstruction.
//!
//! P&L on a date is Σ(position market value × instrument daily return ×
//! risk factor sensitivity) across positions: a linear factor model with
//! sensitivity 1.0 for equity/FX/commodity and modified duration for bonds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use rk_data::SourceSnapshot;
use rk_types::{PortfolioId, RkResult};

/// One day of reconstructed portfolio P&L.
#[derive(Debug, Clone, PartialEq)]
pub struct PnlPoint {
    pub date: NaiveDate,
    pub pnl: Decimal,
}

/// Reconstruct the portfolio's daily P&L series up to `as_of`, keeping at
/// most the trailing `max_points` observations.
///
/// Dates are the union of the instruments' observation dates; an instrument
/// without a price on a date simply contributes nothing that day.
pub fn daily_pnl_series(
    snapshot: &SourceSnapshot,
    portfolio_id: PortfolioId,
    as_of: NaiveDate,
    max_points: usize,
) -> RkResult<Vec<PnlPoint>> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    for position in snapshot.positions_for(portfolio_id) {
        let instrument = snapshot.instrument(position.instrument_id)?;
        let sensitivity = instrument.risk_factor_sensitivity();

        let series = snapshot.market_series(position.instrument_id, NaiveDate::MIN, as_of);
        for window in series.windows(2) {
            let (previous, current) = (window[0], window[1]);
            if previous.price <= Decimal::ZERO {
                continue;
            }
            let daily_return = (current.price - previous.price) / previous.price;
            let contribution = position.market_value * daily_return * sensitivity;
            *by_date.entry(current.date).or_insert(Decimal::ZERO) += contribution;
        }
    }

    let mut points: Vec<PnlPoint> = by_date
        .into_iter()
        .map(|(date, pnl)| PnlPoint { date, pnl })
        .collect();
    if points.len() > max_points {
        points.drain(..points.len() - max_points);
    }
    Ok(points)
}
