//! Configuration surface for the engine.
//!
//! Every threshold, weight and band the scoring and measurement pipelines use
//! lives here, serde-loadable from a JSON file. The `Default` impls carry the
//! documented baseline constants; nothing numeric is hard-coded in the
//! pipelines themselves, so rules can be audited and changed without code
//! edits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::errors::{RiskError, RkResult};
use crate::market::AssetClass;
use crate::records::CreditRating;

/// One band of a step table: values up to and including `upper` earn
/// `points`. `upper: None` is the catch-all for everything above the last
/// bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepBand {
    pub upper: Option<f64>,
    pub points: u32,
}

/// Regulatory-style bucket scoring: a monotone step function of a ratio,
/// not a continuous formula. Bands are ordered by ascending upper bound and
/// the first matching band wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTable {
    pub bands: Vec<StepBand>,
}

impl StepTable {
    pub fn new(pairs: &[(Option<f64>, u32)]) -> Self {
        Self {
            bands: pairs
                .iter()
                .map(|&(upper, points)| StepBand { upper, points })
                .collect(),
        }
    }

    /// Points for a value. Falls back to the catch-all band; a table without
    /// one scores values beyond the last bound as zero.
    pub fn points_for(&self, value: f64) -> u32 {
        for band in &self.bands {
            match band.upper {
                Some(upper) if value <= upper => return band.points,
                Some(_) => continue,
                None => return band.points,
            }
        }
        0
    }

    fn validate(&self, name: &str) -> RkResult<()> {
        let mut last = f64::NEG_INFINITY;
        for band in &self.bands {
            if let Some(upper) = band.upper {
                if upper <= last {
                    return Err(RiskError::Config(format!(
                        "step table '{name}' bounds not strictly ascending at {upper}"
                    )));
                }
                last = upper;
            }
        }
        Ok(())
    }
}

/// Financial-capacity sub-score terms (sub-score capped at `cap`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialCapacityWeights {
    pub cap: u32,
    /// Annual income → points.
    pub income: StepTable,
    /// Added when the employment status implies recurring income.
    pub stable_employment_bonus: u32,
    /// Debt-to-income ratio → points (lower ratio, more points).
    pub debt_to_income: StepTable,
    /// Liquid deposits / outstanding debt → points (higher coverage, more
    /// points). Undefined coverage (no debt) earns the catch-all band.
    pub liquidity_buffer: StepTable,
}

impl Default for FinancialCapacityWeights {
    fn default() -> Self {
        Self {
            cap: 300,
            income: StepTable::new(&[
                (Some(20_000.0), 10),
                (Some(50_000.0), 40),
                (Some(100_000.0), 70),
                (Some(200_000.0), 90),
                (None, 100),
            ]),
            stable_employment_bonus: 20,
            debt_to_income: StepTable::new(&[
                (Some(0.10), 100),
                (Some(0.35), 80),
                (Some(0.50), 55),
                (Some(1.00), 30),
                (Some(2.00), 10),
                (None, 0),
            ]),
            liquidity_buffer: StepTable::new(&[
                (Some(0.10), 5),
                (Some(0.25), 20),
                (Some(0.50), 40),
                (Some(1.00), 60),
                (None, 80),
            ]),
        }
    }
}

/// Payment-behaviour sub-score terms (sub-score capped at `cap`).
///
/// These terms score observed credit behaviour; a customer with no credit
/// facilities and no transaction history has nothing to score and earns 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBehaviorWeights {
    pub cap: u32,
    /// Max days-past-due → points (clean history earns the first band).
    pub delinquency_severity: StepTable,
    /// Starting points for the frequency term, reduced per delinquency event.
    pub frequency_base: u32,
    pub dpd_30_penalty: u32,
    pub dpd_60_penalty: u32,
    pub dpd_90_penalty: u32,
    /// Credit-limit utilization → points (lower utilization, more points).
    pub utilization: StepTable,
    // Behavioural-risk penalties, subtracted from the summed terms.
    pub overdraft_penalty: u32,
    pub large_withdrawal_penalty: u32,
    pub restricted_category_penalty: u32,
}

impl Default for PaymentBehaviorWeights {
    fn default() -> Self {
        Self {
            cap: 400,
            delinquency_severity: StepTable::new(&[
                (Some(0.0), 160),
                (Some(29.0), 120),
                (Some(59.0), 80),
                (Some(89.0), 40),
                (None, 0),
            ]),
            frequency_base: 120,
            dpd_30_penalty: 15,
            dpd_60_penalty: 30,
            dpd_90_penalty: 45,
            utilization: StepTable::new(&[
                (Some(0.30), 120),
                (Some(0.50), 90),
                (Some(0.75), 60),
                (Some(0.90), 30),
                (None, 0),
            ]),
            overdraft_penalty: 10,
            large_withdrawal_penalty: 5,
            restricted_category_penalty: 15,
        }
    }
}

/// Relationship-stability sub-score terms (sub-score capped at `cap`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStabilityWeights {
    pub cap: u32,
    /// Tenure in whole years → points.
    pub tenure: StepTable,
    /// Count of distinct product types held → points.
    pub product_diversity: StepTable,
    /// Active months in the lookback window → points.
    pub activity: StepTable,
}

impl Default for RelationshipStabilityWeights {
    fn default() -> Self {
        Self {
            cap: 300,
            tenure: StepTable::new(&[
                (Some(1.0), 20),
                (Some(3.0), 60),
                (Some(5.0), 90),
                (Some(10.0), 110),
                (None, 120),
            ]),
            product_diversity: StepTable::new(&[
                (Some(0.0), 0),
                (Some(1.0), 40),
                (Some(2.0), 70),
                (Some(3.0), 90),
                (None, 100),
            ]),
            activity: StepTable::new(&[
                (Some(0.0), 0),
                (Some(3.0), 20),
                (Some(6.0), 40),
                (Some(9.0), 60),
                (None, 80),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub financial: FinancialCapacityWeights,
    pub payment: PaymentBehaviorWeights,
    pub relationship: RelationshipStabilityWeights,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            financial: FinancialCapacityWeights::default(),
            payment: PaymentBehaviorWeights::default(),
            relationship: RelationshipStabilityWeights::default(),
        }
    }
}

/// Macro-adjustment bands applied to the summed sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroBands {
    /// Stress when unemployment at or above this, or GDP growth below
    /// `stress_gdp_below`.
    pub stress_unemployment_at_least: f64,
    pub stress_gdp_below: f64,
    pub stress_multiplier: f64,
    /// Boom when unemployment at or below this and GDP growth at or above
    /// `boom_gdp_at_least`.
    pub boom_unemployment_at_most: f64,
    pub boom_gdp_at_least: f64,
    pub boom_multiplier: f64,
    /// Used outside both bands and whenever macro data is missing.
    pub neutral_multiplier: f64,
}

impl Default for MacroBands {
    fn default() -> Self {
        Self {
            stress_unemployment_at_least: 0.08,
            stress_gdp_below: 0.0,
            stress_multiplier: 0.85,
            boom_unemployment_at_most: 0.04,
            boom_gdp_at_least: 0.03,
            boom_multiplier: 1.08,
            neutral_multiplier: 1.0,
        }
    }
}

impl MacroBands {
    /// Multiplier for an observation; stress takes precedence over boom.
    pub fn multiplier_for(&self, unemployment_rate: f64, gdp_growth: f64) -> f64 {
        if unemployment_rate >= self.stress_unemployment_at_least
            || gdp_growth < self.stress_gdp_below
        {
            self.stress_multiplier
        } else if unemployment_rate <= self.boom_unemployment_at_most
            && gdp_growth >= self.boom_gdp_at_least
        {
            self.boom_multiplier
        } else {
            self.neutral_multiplier
        }
    }
}

/// Logistic PD transform: PD = 1 / (1 + exp((score − center) / scale)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdCurve {
    pub center: f64,
    pub scale: f64,
}

impl Default for PdCurve {
    fn default() -> Self {
        Self {
            center: 500.0,
            scale: 100.0,
        }
    }
}

/// Composite-score thresholds for the rating ladder (inclusive lower bounds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingThresholds {
    pub aaa_at_least: u32,
    pub aa_at_least: u32,
    pub a_at_least: u32,
    pub bbb_at_least: u32,
    pub bb_at_least: u32,
    pub b_at_least: u32,
}

impl Default for RatingThresholds {
    fn default() -> Self {
        Self {
            aaa_at_least: 900,
            aa_at_least: 800,
            a_at_least: 700,
            bbb_at_least: 600,
            bb_at_least: 500,
            b_at_least: 400,
        }
    }
}

impl RatingThresholds {
    pub fn rating_for(&self, composite_score: u32) -> CreditRating {
        match composite_score {
            s if s >= self.aaa_at_least => CreditRating::Aaa,
            s if s >= self.aa_at_least => CreditRating::Aa,
            s if s >= self.a_at_least => CreditRating::A,
            s if s >= self.bbb_at_least => CreditRating::Bbb,
            s if s >= self.bb_at_least => CreditRating::Bb,
            s if s >= self.b_at_least => CreditRating::B,
            _ => CreditRating::Ccc,
        }
    }
}

/// One LGD tier: coverage at or above `coverage_at_least` maps to `lgd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgdTier {
    pub coverage_at_least: f64,
    pub lgd: f64,
}

/// Collateralization rule: LGD from the ratio of liquid deposits to
/// outstanding debt. Tiers ordered by descending coverage; below every tier
/// the uncovered floor applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgdBands {
    pub tiers: Vec<LgdTier>,
    pub uncovered_lgd: f64,
}

impl Default for LgdBands {
    fn default() -> Self {
        Self {
            tiers: vec![
                LgdTier {
                    coverage_at_least: 1.0,
                    lgd: 0.15,
                },
                LgdTier {
                    coverage_at_least: 0.5,
                    lgd: 0.35,
                },
                LgdTier {
                    coverage_at_least: 0.2,
                    lgd: 0.50,
                },
            ],
            uncovered_lgd: 0.65,
        }
    }
}

impl LgdBands {
    /// LGD for a coverage ratio. Undefined coverage (no outstanding debt)
    /// earns the best tier: there is nothing at risk.
    pub fn lgd_for(&self, coverage: Option<f64>) -> f64 {
        let coverage = match coverage {
            Some(c) => c,
            None => return self.tiers.first().map(|t| t.lgd).unwrap_or(self.uncovered_lgd),
        };
        for tier in &self.tiers {
            if coverage >= tier.coverage_at_least {
                return tier.lgd;
            }
        }
        self.uncovered_lgd
    }
}

/// Capital ratios and risk weights for the reporting aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalPolicy {
    /// Basel-style base capital ratio (8%).
    pub base_capital_ratio: Decimal,
    /// Rating-indexed risk weights (AAA → 20% … CCC → 200%).
    pub risk_weights: BTreeMap<CreditRating, Decimal>,
    /// Multiplier on √t-scaled historical VaR99 for the market capital floor.
    pub var_capital_multiplier: Decimal,
    /// Floor as a fraction of portfolio value.
    pub minimum_capital_ratio: Decimal,
    /// Holding period in days for the square-root-of-time scaling.
    pub holding_period_days: u32,
}

impl Default for CapitalPolicy {
    fn default() -> Self {
        let mut risk_weights = BTreeMap::new();
        risk_weights.insert(CreditRating::Aaa, Decimal::new(20, 2));
        risk_weights.insert(CreditRating::Aa, Decimal::new(35, 2));
        risk_weights.insert(CreditRating::A, Decimal::new(50, 2));
        risk_weights.insert(CreditRating::Bbb, Decimal::new(75, 2));
        risk_weights.insert(CreditRating::Bb, Decimal::new(100, 2));
        risk_weights.insert(CreditRating::B, Decimal::new(150, 2));
        risk_weights.insert(CreditRating::Ccc, Decimal::new(200, 2));
        Self {
            base_capital_ratio: Decimal::new(8, 2),
            risk_weights,
            var_capital_multiplier: Decimal::from(3),
            minimum_capital_ratio: Decimal::new(8, 2),
            holding_period_days: 10,
        }
    }
}

impl CapitalPolicy {
    pub fn risk_weight(&self, rating: CreditRating) -> Decimal {
        self.risk_weights
            .get(&rating)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

/// VaR / ES estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSettings {
    /// Lookback window in observations (trading days).
    pub lookback: usize,
    /// At or below this sample size measurements are flagged LOW_CONFIDENCE.
    pub min_observations: usize,
    pub z_95: f64,
    pub z_99: f64,
    /// Historical / parametric magnitude ratio above which the fat-tail
    /// divergence warning is raised.
    pub tail_divergence_ratio: f64,
}

impl Default for VarSettings {
    fn default() -> Self {
        Self {
            lookback: 252,
            min_observations: 20,
            z_95: 1.645,
            z_99: 2.326,
            tail_divergence_ratio: 2.0,
        }
    }
}

/// Built-in stress scenario names.
pub const SCENARIO_EQUITY_CRASH: &str = "equity-crash";
pub const SCENARIO_FLIGHT_TO_QUALITY: &str = "flight-to-quality";
pub const SCENARIO_RATES_SHOCK: &str = "rates-shock";

/// Named scenarios: asset class → shock fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenarios {
    pub scenarios: BTreeMap<String, BTreeMap<AssetClass, f64>>,
}

impl Default for StressScenarios {
    fn default() -> Self {
        let mut scenarios = BTreeMap::new();

        let mut equity_crash = BTreeMap::new();
        equity_crash.insert(AssetClass::Equity, -0.30);
        equity_crash.insert(AssetClass::Bond, -0.15);
        equity_crash.insert(AssetClass::Fx, 0.0);
        equity_crash.insert(AssetClass::Commodity, -0.10);
        scenarios.insert(SCENARIO_EQUITY_CRASH.to_string(), equity_crash);

        let mut flight_to_quality = BTreeMap::new();
        flight_to_quality.insert(AssetClass::Equity, -0.15);
        flight_to_quality.insert(AssetClass::Bond, 0.05);
        flight_to_quality.insert(AssetClass::Fx, 0.02);
        flight_to_quality.insert(AssetClass::Commodity, -0.08);
        scenarios.insert(SCENARIO_FLIGHT_TO_QUALITY.to_string(), flight_to_quality);

        let mut rates_shock = BTreeMap::new();
        rates_shock.insert(AssetClass::Equity, -0.10);
        rates_shock.insert(AssetClass::Bond, -0.12);
        rates_shock.insert(AssetClass::Fx, -0.03);
        rates_shock.insert(AssetClass::Commodity, 0.15);
        scenarios.insert(SCENARIO_RATES_SHOCK.to_string(), rates_shock);

        Self { scenarios }
    }
}

/// Batch-engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Per-entity computation deadline; entities over it produce no record
    /// this cycle, are reported as timed out and retried next cycle.
    pub entity_timeout_ms: u64,
    /// Transaction lookback window in days (12 months).
    pub txn_lookback_days: i64,
    /// Withdrawals at or above this magnitude count as large.
    pub large_withdrawal_threshold: Decimal,
    /// Merchant categories counted as restricted.
    pub restricted_categories: BTreeSet<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let mut restricted_categories = BTreeSet::new();
        restricted_categories.insert("gambling".to_string());
        restricted_categories.insert("crypto_exchange".to_string());
        restricted_categories.insert("pawn".to_string());
        Self {
            entity_timeout_ms: 5_000,
            txn_lookback_days: 365,
            large_withdrawal_threshold: Decimal::from(10_000),
            restricted_categories,
        }
    }
}

/// Complete configuration for one engine deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub scoring: ScoringWeights,
    pub macro_bands: MacroBands,
    pub pd_curve: PdCurve,
    pub rating_thresholds: RatingThresholds,
    pub lgd_bands: LgdBands,
    pub capital: CapitalPolicy,
    pub var: VarSettings,
    pub stress: StressScenarios,
    pub engine: EngineSettings,
}

impl RiskConfig {
    /// Load and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RkResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RiskConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipelines cannot run on.
    pub fn validate(&self) -> RkResult<()> {
        self.scoring.financial.income.validate("financial.income")?;
        self.scoring
            .financial
            .debt_to_income
            .validate("financial.debt_to_income")?;
        self.scoring
            .financial
            .liquidity_buffer
            .validate("financial.liquidity_buffer")?;
        self.scoring
            .payment
            .delinquency_severity
            .validate("payment.delinquency_severity")?;
        self.scoring.payment.utilization.validate("payment.utilization")?;
        self.scoring.relationship.tenure.validate("relationship.tenure")?;
        self.scoring
            .relationship
            .product_diversity
            .validate("relationship.product_diversity")?;
        self.scoring.relationship.activity.validate("relationship.activity")?;

        if self.pd_curve.scale <= 0.0 {
            return Err(RiskError::Config("pd_curve.scale must be positive".into()));
        }
        if self.var.min_observations == 0 || self.var.lookback < self.var.min_observations {
            return Err(RiskError::Config(
                "var lookback must be at least min_observations (both nonzero)".into(),
            ));
        }
        if !(self.lgd_bands.uncovered_lgd >= 0.0 && self.lgd_bands.uncovered_lgd <= 1.0) {
            return Err(RiskError::Config("uncovered LGD must lie in [0, 1]".into()));
        }
        for tier in &self.lgd_bands.tiers {
            if !(tier.lgd >= 0.0 && tier.lgd <= 1.0) {
                return Err(RiskError::Config(format!(
                    "LGD tier at coverage {} must lie in [0, 1]",
                    tier.coverage_at_least
                )));
            }
        }
        Ok(())
    }
}
