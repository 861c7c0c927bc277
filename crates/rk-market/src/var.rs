//! Value-at-Risk and Expected Shortfall estimators over a daily P&L sample.
//!
//! All estimators return positive loss magnitudes. An empty sample yields
//! zero; sample adequacy checks (minimum observations, confidence flags)
//! stay with the caller.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Historical VaR at the given confidence level (e.g. 0.95).
///
/// Empirical quantile of the P&L distribution at `1 - confidence`, with
/// linear interpolation between order statistics, negated so a loss reads
/// as a positive number. Clamped at zero for samples with no loss tail.
pub fn historical_var(pnl: &[Decimal], confidence: f64) -> Decimal {
    (-quantile(pnl, 1.0 - confidence)).max(Decimal::ZERO)
}

/// Parametric (variance-covariance) VaR: `z·σ − μ` of the daily P&L,
/// clamped at zero.
pub fn parametric_var(pnl: &[Decimal], z: f64) -> Decimal {
    let mu = mean(pnl);
    let sigma = stddev(pnl, mu);
    let var = Decimal::from_f64_retain(z).unwrap_or_default() * sigma - mu;
    var.max(Decimal::ZERO)
}

/// Expected Shortfall: mean P&L of the tail at or below the historical
/// quantile, negated. Clamped at zero for samples with no loss tail.
pub fn expected_shortfall(pnl: &[Decimal], confidence: f64) -> Decimal {
    let cutoff = quantile(pnl, 1.0 - confidence);
    let tail: Vec<Decimal> = pnl.iter().copied().filter(|&p| p <= cutoff).collect();
    if tail.is_empty() {
        return Decimal::ZERO;
    }
    (-mean(&tail)).max(Decimal::ZERO)
}

/// Square-root-of-time scaling of a one-day loss magnitude to a holding
/// period in days.
pub fn scale_by_holding_period(value: Decimal, days: u32) -> Decimal {
    let factor = Decimal::from_f64_retain((days as f64).sqrt()).unwrap_or(Decimal::ONE);
    value * factor
}

pub(crate) fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

/// Sample standard deviation (n − 1), computed through f64 for the square
/// root.
pub(crate) fn stddev(values: &[Decimal], mean: Decimal) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let sum_sq: f64 = values
        .iter()
        .map(|v| {
            let diff = (*v - mean).to_f64().unwrap_or(0.0);
            diff * diff
        })
        .sum();
    let variance = sum_sq / (values.len() - 1) as f64;
    Decimal::from_f64_retain(variance.sqrt()).unwrap_or_default()
}

/// Empirical quantile with linear interpolation at rank `p · (n − 1)`.
fn quantile(values: &[Decimal], p: f64) -> Decimal {
    let mut sorted = values.to_vec();
    sorted.sort();
    let n = sorted.len();
    if n == 0 {
        return Decimal::ZERO;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = Decimal::from_f64_retain(rank - lower as f64).unwrap_or_default();
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
