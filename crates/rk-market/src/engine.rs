//! Per-portfolio market risk measurement.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use rk_data::SourceSnapshot;
use rk_types::{
    DataError, DataQualityFlag, MeasurementError, PortfolioId, QualityFlags, RiskConfig,
    RiskMeasurement, RkResult,
};

use crate::pnl::daily_pnl_series;
use crate::stress::StressTester;
use crate::var;

/// Computes one [`RiskMeasurement`] per portfolio per evaluation date.
///
/// Stateless apart from configuration; safe to share across worker threads.
#[derive(Debug, Clone)]
pub struct MarketRiskEngine {
    config: RiskConfig,
}

impl MarketRiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Measure a portfolio as of the snapshot's cutoff date.
    ///
    /// A short P&L history (at or below the configured minimum) degrades to
    /// a LOW_CONFIDENCE measurement rather than failing; an empty history is
    /// an error because no estimate is possible at all.
    pub fn measure(
        &self,
        snapshot: &SourceSnapshot,
        portfolio_id: PortfolioId,
    ) -> RkResult<RiskMeasurement> {
        let positions = snapshot.positions_for(portfolio_id);
        if positions.is_empty() {
            return Err(DataError::PortfolioNotFound {
                portfolio_id: portfolio_id.to_string(),
            }
            .into());
        }

        let settings = &self.config.var;
        let mut flags = QualityFlags::default();

        let series = daily_pnl_series(snapshot, portfolio_id, snapshot.as_of(), settings.lookback)?;
        if series.is_empty() {
            return Err(MeasurementError::InsufficientSample {
                observed: 0,
                required: settings.min_observations,
            }
            .into());
        }
        if series.len() <= settings.min_observations {
            warn!(
                %portfolio_id,
                observed = series.len(),
                required = settings.min_observations,
                "thin P&L history, measurement flagged low confidence"
            );
            flags.raise(DataQualityFlag::LowConfidence);
        }

        let pnl: Vec<Decimal> = series.iter().map(|p| p.pnl).collect();

        let var_95_historical = var::historical_var(&pnl, 0.95);
        let var_99_historical = var::historical_var(&pnl, 0.99);
        let var_95_parametric = var::parametric_var(&pnl, settings.z_95);
        let var_99_parametric = var::parametric_var(&pnl, settings.z_99);
        let expected_shortfall_95 = var::expected_shortfall(&pnl, 0.95);
        let expected_shortfall_99 = var::expected_shortfall(&pnl, 0.99);

        let hist = var_99_historical.to_f64().unwrap_or(0.0);
        let param = var_99_parametric.to_f64().unwrap_or(0.0);
        if param > 0.0 && hist > param * settings.tail_divergence_ratio {
            flags.raise(DataQualityFlag::TailDivergence);
        }

        let (portfolio_value, weights) =
            StressTester::asset_class_weights(snapshot, portfolio_id)?;
        let scenario_results =
            StressTester::new(self.config.stress.clone()).run_all(portfolio_value, &weights)?;

        let capital = &self.config.capital;
        let var_floor = capital.var_capital_multiplier
            * var::scale_by_holding_period(var_99_historical, capital.holding_period_days);
        let value_floor = portfolio_value * capital.minimum_capital_ratio;
        let required_capital = var_floor.max(value_floor);

        debug!(
            %portfolio_id,
            sample_size = pnl.len(),
            %var_99_historical,
            %required_capital,
            "portfolio measured"
        );

        Ok(RiskMeasurement {
            id: Uuid::new_v4(),
            portfolio_id,
            as_of: snapshot.as_of(),
            computed_at: Utc::now(),
            portfolio_value,
            sample_size: pnl.len(),
            var_95_historical,
            var_99_historical,
            var_95_parametric,
            var_99_parametric,
            expected_shortfall_95,
            expected_shortfall_99,
            max_drawdown: max_drawdown(&pnl),
            scenario_results,
            required_capital,
            flags,
        })
    }
}

/// Maximum peak-to-trough decline of the cumulative P&L path, as a positive
/// magnitude.
fn max_drawdown(pnl: &[Decimal]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    for p in pnl {
        cumulative += *p;
        if cumulative > peak {
            peak = cumulative;
        }
        let drawdown = peak - cumulative;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}
