//! Deterministic stress scenarios.
//!
//! Each scenario is a named map of asset class to shock return. Projected
//! P&L is a first-order approximation: portfolio value times the
//! weight-averaged shock, with no cross effects or repricing.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use rk_data::SourceSnapshot;
use rk_types::{
    AssetClass, MeasurementError, PortfolioId, RkResult, ScenarioResult, StressScenarios,
};

const LINEAR_APPROXIMATION: &str = "linear";

/// Applies configured shock scenarios to a portfolio's asset class mix.
#[derive(Debug, Clone)]
pub struct StressTester {
    scenarios: StressScenarios,
}

impl StressTester {
    pub fn new(scenarios: StressScenarios) -> Self {
        Self { scenarios }
    }

    /// Total market value and asset class weights of a portfolio.
    ///
    /// Weights are value fractions and sum to 1.0 for a non-empty book.
    /// An empty or zero-value portfolio yields an empty weight map.
    pub fn asset_class_weights(
        snapshot: &SourceSnapshot,
        portfolio_id: PortfolioId,
    ) -> RkResult<(Decimal, BTreeMap<AssetClass, f64>)> {
        use rust_decimal::prelude::ToPrimitive;

        let mut by_class: BTreeMap<AssetClass, Decimal> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        for position in snapshot.positions_for(portfolio_id) {
            let instrument = snapshot.instrument(position.instrument_id)?;
            let class = instrument.instrument_type.asset_class();
            *by_class.entry(class).or_insert(Decimal::ZERO) += position.market_value;
            total += position.market_value;
        }

        if total == Decimal::ZERO {
            return Ok((total, BTreeMap::new()));
        }

        let weights = by_class
            .into_iter()
            .map(|(class, value)| (class, (value / total).to_f64().unwrap_or(0.0)))
            .collect();
        Ok((total, weights))
    }

    /// Project P&L for one named scenario.
    ///
    /// Non-empty weight maps must sum to 1; an empty map means a zero-value
    /// book and projects zero.
    pub fn apply(
        &self,
        name: &str,
        portfolio_value: Decimal,
        weights: &BTreeMap<AssetClass, f64>,
    ) -> RkResult<ScenarioResult> {
        let sum: f64 = weights.values().sum();
        if !weights.is_empty() && (sum - 1.0).abs() > 1e-6 {
            return Err(MeasurementError::WeightsNotNormalized { sum }.into());
        }

        let shocks = self.scenarios.scenarios.get(name).ok_or_else(|| {
            rk_types::RiskError::from(MeasurementError::UnknownScenario {
                name: name.to_string(),
            })
        })?;

        let weighted_shock: f64 = weights
            .iter()
            .map(|(class, weight)| weight * shocks.get(class).copied().unwrap_or(0.0))
            .sum();

        Ok(ScenarioResult {
            pnl: portfolio_value * Decimal::from_f64_retain(weighted_shock).unwrap_or_default(),
            approximation: LINEAR_APPROXIMATION.to_string(),
        })
    }

    /// Project P&L for every configured scenario, keyed by name.
    pub fn run_all(
        &self,
        portfolio_value: Decimal,
        weights: &BTreeMap<AssetClass, f64>,
    ) -> RkResult<BTreeMap<String, ScenarioResult>> {
        let mut results = BTreeMap::new();
        for name in self.scenarios.scenarios.keys() {
            results.insert(name.clone(), self.apply(name, portfolio_value, weights)?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_types::SCENARIO_EQUITY_CRASH;
    use rust_decimal_macros::dec;

    fn tester() -> StressTester {
        StressTester::new(StressScenarios::default())
    }

    #[test]
    fn equity_crash_on_mixed_book() {
        let mut weights = BTreeMap::new();
        weights.insert(AssetClass::Equity, 0.6);
        weights.insert(AssetClass::Bond, 0.4);

        let result = tester()
            .apply(SCENARIO_EQUITY_CRASH, dec!(1_000_000), &weights)
            .unwrap();
        // 0.6 × −30% + 0.4 × −15% = −24% of value.
        let diff = (result.pnl - dec!(-240_000)).abs();
        assert!(diff < dec!(0.01), "pnl was {}", result.pnl);
        assert_eq!(result.approximation, "linear");
    }

    #[test]
    fn unnormalized_weights_are_rejected() {
        let mut weights = BTreeMap::new();
        weights.insert(AssetClass::Equity, 0.6);
        weights.insert(AssetClass::Bond, 0.1);

        let err = tester()
            .apply(SCENARIO_EQUITY_CRASH, dec!(1_000), &weights)
            .unwrap_err();
        assert!(
            matches!(
                err,
                rk_types::RiskError::Measurement(MeasurementError::WeightsNotNormalized { .. })
            ),
            "got: {err}"
        );
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        let result = tester().apply("alien-invasion", dec!(100), &BTreeMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn unmapped_asset_class_contributes_nothing() {
        let mut scenarios = StressScenarios::default();
        scenarios
            .scenarios
            .get_mut(SCENARIO_EQUITY_CRASH)
            .unwrap()
            .remove(&AssetClass::Commodity);

        let mut weights = BTreeMap::new();
        weights.insert(AssetClass::Commodity, 1.0);
        let result = StressTester::new(scenarios)
            .apply(SCENARIO_EQUITY_CRASH, dec!(500), &weights)
            .unwrap();
        assert_eq!(result.pnl, Decimal::ZERO);
    }

    #[test]
    fn zero_value_book_projects_zero() {
        let result = tester()
            .apply(SCENARIO_EQUITY_CRASH, Decimal::ZERO, &BTreeMap::new())
            .unwrap();
        assert_eq!(result.pnl, Decimal::ZERO);
    }

    #[test]
    fn run_all_covers_every_configured_scenario() {
        let mut weights = BTreeMap::new();
        weights.insert(AssetClass::Equity, 1.0);
        let results = tester().run_all(dec!(100), &weights).unwrap();
        assert_eq!(results.len(), StressScenarios::default().scenarios.len());
        assert!(results.contains_key(SCENARIO_EQUITY_CRASH));
    }
}
