//! Derived record types produced by the engine.
//!
//! [`FeatureVector`] is the intermediate hand-off between the feature
//! aggregator and the scorer; [`RiskScoreRecord`] and [`RiskMeasurement`] are
//! the append-only outputs consumed by downstream reporting. Historical
//! snapshots are retained for backtesting and never mutated in place.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::entities::{CustomerId, CustomerSegment, EmploymentStatus};
use crate::flags::QualityFlags;
use crate::market::PortfolioId;

/// Macro indicators observed for the customer's country at the as-of month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroObservation {
    pub unemployment_rate: f64,
    pub gdp_growth: f64,
    pub interest_rate: f64,
}

/// Per-customer feature vector at an as-of date.
///
/// Pure function of the source snapshot: identical inputs must produce an
/// identical vector (audit/backtesting requirement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub customer_id: CustomerId,
    pub as_of: NaiveDate,
    pub segment: CustomerSegment,
    pub employment_status: EmploymentStatus,
    pub tenure_years: u32,

    // --- exposure & capacity ---
    pub annual_income: Decimal,
    pub liquid_deposits: Decimal,
    pub outstanding_debt: Decimal,
    pub credit_limit: Decimal,
    /// Outstanding / limit. `None` when the limit is zero (flagged).
    pub utilization: Option<f64>,
    /// Σ outstanding × rate across open loans, an annualized estimate.
    pub interest_income: Decimal,

    // --- payment behaviour ---
    pub dpd_30_count: u32,
    pub dpd_60_count: u32,
    pub dpd_90_count: u32,
    pub max_days_past_due: u32,

    // --- 12-month transaction statistics ---
    pub txn_count: u32,
    pub txn_mean: Decimal,
    pub txn_stddev: Decimal,
    pub active_months: u32,

    // --- relationship ---
    pub product_diversity: u32,

    // --- behavioural risk counters ---
    pub overdraft_count: u32,
    pub large_withdrawal_count: u32,
    pub restricted_category_count: u32,

    // --- macro context ---
    pub macro_observation: Option<MacroObservation>,

    pub flags: QualityFlags,
}

/// Ordinal credit rating ladder. `Aaa` is the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CreditRating {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "BBB")]
    Bbb,
    #[serde(rename = "BB")]
    Bb,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "CCC")]
    Ccc,
}

impl fmt::Display for CreditRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreditRating::Aaa => "AAA",
            CreditRating::Aa => "AA",
            CreditRating::A => "A",
            CreditRating::Bbb => "BBB",
            CreditRating::Bb => "BB",
            CreditRating::B => "B",
            CreditRating::Ccc => "CCC",
        };
        write!(f, "{}", s)
    }
}

/// Per-customer-per-period credit risk snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreRecord {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub as_of: NaiveDate,
    pub computed_at: DateTime<Utc>,
    pub segment: CustomerSegment,

    // --- sub-scores (capped 300 / 400 / 300) ---
    pub financial_capacity_score: u32,
    pub payment_behavior_score: u32,
    pub relationship_stability_score: u32,
    /// Sum of sub-scores × macro multiplier, rounded, clamped to [0, 1000].
    pub composite_score: u32,
    pub macro_multiplier: f64,

    // --- loss parameters ---
    /// Strictly in (0, 1); strictly decreasing in composite score.
    pub probability_of_default: f64,
    /// In [0, 1], from the deposit-coverage tier.
    pub loss_given_default: f64,
    /// PD × LGD × exposure, never negative.
    pub expected_loss: Decimal,
    pub exposure: Decimal,
    pub credit_rating: CreditRating,
    /// (interest income − EL) / allocated capital. `None` when the
    /// denominator is undefined (flagged).
    pub risk_adjusted_return: Option<Decimal>,

    pub flags: QualityFlags,
}

/// Projected P&L of one named stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Signed P&L under the scenario (negative = loss).
    pub pnl: Decimal,
    /// Simplification marker: scenarios are linear shock combinations, not
    /// full repricings.
    pub approximation: String,
}

/// Per-portfolio-per-date market risk snapshot. Append-only time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMeasurement {
    pub id: Uuid,
    pub portfolio_id: PortfolioId,
    pub as_of: NaiveDate,
    pub computed_at: DateTime<Utc>,

    pub portfolio_value: Decimal,
    pub sample_size: usize,

    // --- VaR / ES, all positive loss magnitudes ---
    pub var_95_historical: Decimal,
    pub var_99_historical: Decimal,
    pub var_95_parametric: Decimal,
    pub var_99_parametric: Decimal,
    pub expected_shortfall_95: Decimal,
    pub expected_shortfall_99: Decimal,

    /// Maximum peak-to-trough drawdown of the cumulative P&L path.
    pub max_drawdown: Decimal,

    /// Scenario name → advisory projected P&L. Ordered map so identical
    /// inputs serialize identically.
    pub scenario_results: BTreeMap<String, ScenarioResult>,

    /// max(capital multiplier × √t-scaled historical VaR99,
    ///     portfolio value × minimum capital ratio).
    pub required_capital: Decimal,

    pub flags: QualityFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_ordering_is_ordinal() {
        assert!(CreditRating::Aaa < CreditRating::Aa);
        assert!(CreditRating::Bb < CreditRating::Ccc);
    }

    #[test]
    fn rating_wire_format() {
        assert_eq!(
            serde_json::to_string(&CreditRating::Bbb).unwrap(),
            r#""BBB""#
        );
        let parsed: CreditRating = serde_json::from_str(r#""AA""#).unwrap();
        assert_eq!(parsed, CreditRating::Aa);
    }

    #[test]
    fn rating_display_matches_wire_format() {
        for rating in [
            CreditRating::Aaa,
            CreditRating::Aa,
            CreditRating::A,
            CreditRating::Bbb,
            CreditRating::Bb,
            CreditRating::B,
            CreditRating::Ccc,
        ] {
            let wire = serde_json::to_string(&rating).unwrap();
            assert_eq!(wire, format!("\"{}\"", rating));
        }
    }
}
