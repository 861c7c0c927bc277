//! Market capital roll-up.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rk_types::{PortfolioId, QualityFlags, RiskMeasurement};

/// Per-portfolio capital line, ordered by portfolio id in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReportRow {
    pub portfolio_id: PortfolioId,
    pub portfolio_value: Decimal,
    pub sample_size: usize,
    pub var_99_historical: Decimal,
    pub expected_shortfall_99: Decimal,
    pub max_drawdown: Decimal,
    /// Regulatory floor carried over from the measurement:
    /// max(multiplier × √t-scaled VaR99, value × minimum ratio).
    pub required_capital: Decimal,
    pub flags: QualityFlags,
}

/// Book-level market capital summary for one measurement cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapitalReport {
    pub as_of: NaiveDate,
    pub rows: Vec<MarketReportRow>,
    pub total_value: Decimal,
    pub total_required_capital: Decimal,
    /// Portfolios whose measurement carries any quality flag, ordered.
    pub attention: Vec<PortfolioId>,
}

/// Aggregates measurements into [`MarketCapitalReport`]s.
#[derive(Debug, Clone, Default)]
pub struct MarketReporter;

impl MarketReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn roll_up(&self, as_of: NaiveDate, measurements: &[RiskMeasurement]) -> MarketCapitalReport {
        let mut rows: Vec<MarketReportRow> = measurements
            .iter()
            .map(|m| MarketReportRow {
                portfolio_id: m.portfolio_id,
                portfolio_value: m.portfolio_value,
                sample_size: m.sample_size,
                var_99_historical: m.var_99_historical,
                expected_shortfall_99: m.expected_shortfall_99,
                max_drawdown: m.max_drawdown,
                required_capital: m.required_capital,
                flags: m.flags.clone(),
            })
            .collect();
        rows.sort_by_key(|r| r.portfolio_id);

        let attention: Vec<PortfolioId> = rows
            .iter()
            .filter(|r| !r.flags.is_empty())
            .map(|r| r.portfolio_id)
            .collect();

        MarketCapitalReport {
            as_of,
            total_value: rows.iter().map(|r| r.portfolio_value).sum(),
            total_required_capital: rows.iter().map(|r| r.required_capital).sum(),
            rows,
            attention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rk_types::DataQualityFlag;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn measurement(value: Decimal, capital: Decimal) -> RiskMeasurement {
        RiskMeasurement {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            as_of: date(2024, 6, 30),
            computed_at: Utc::now(),
            portfolio_value: value,
            sample_size: 120,
            var_95_historical: dec!(800),
            var_99_historical: dec!(1_500),
            var_95_parametric: dec!(750),
            var_99_parametric: dec!(1_200),
            expected_shortfall_95: dec!(900),
            expected_shortfall_99: dec!(1_700),
            max_drawdown: dec!(3_000),
            scenario_results: BTreeMap::new(),
            required_capital: capital,
            flags: QualityFlags::default(),
        }
    }

    #[test]
    fn rows_sorted_and_totals_summed() {
        let a = measurement(dec!(100_000), dec!(8_000));
        let b = measurement(dec!(50_000), dec!(4_000));
        let report = MarketReporter::new().roll_up(date(2024, 6, 30), &[a, b]);

        assert_eq!(report.rows.len(), 2);
        assert!(report.rows[0].portfolio_id < report.rows[1].portfolio_id);
        assert_eq!(report.total_value, dec!(150_000));
        assert_eq!(report.total_required_capital, dec!(12_000));
        assert!(report.attention.is_empty());
    }

    #[test]
    fn flagged_portfolios_listed_for_attention() {
        let mut thin = measurement(dec!(10_000), dec!(800));
        thin.flags.raise(DataQualityFlag::LowConfidence);
        let clean = measurement(dec!(20_000), dec!(1_600));

        let report = MarketReporter::new().roll_up(date(2024, 6, 30), &[thin.clone(), clean]);
        assert_eq!(report.attention, vec![thin.portfolio_id]);
        // Flagged rows still count toward totals; only fatal flags exclude.
        assert_eq!(report.total_value, dec!(30_000));
    }

    #[test]
    fn identical_input_serializes_identically() {
        let rows = vec![measurement(dec!(75_000), dec!(6_000))];
        let reporter = MarketReporter::new();
        let first = reporter.roll_up(date(2024, 6, 30), &rows);
        let second = reporter.roll_up(date(2024, 6, 30), &rows);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
