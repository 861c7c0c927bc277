//! Composite credit scoring.
//!
//! Three capped sub-scores built from step tables, a macro adjustment
//! multiplier, then the derived loss parameters: logistic PD, tiered LGD,
//! expected loss and risk-adjusted return. Every threshold and weight comes
//! from [`rk_types::RiskConfig`]; the scorer itself holds no business
//! constants.
//!
//! Soft failures (zero denominators) define the affected ratio as zero or
//! undefined and flag the record; only a derived field leaving its documented
//! range is fatal for the record.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use rk_types::config::{
    FinancialCapacityWeights, PaymentBehaviorWeights, RelationshipStabilityWeights,
};
use rk_types::{
    DataQualityFlag, FeatureVector, QualityFlags, RiskConfig, RiskScoreRecord, RkResult,
    ScoringError,
};

/// Lowest and highest composite score the scorer can emit.
pub const COMPOSITE_MIN: u32 = 0;
pub const COMPOSITE_MAX: u32 = 1000;

/// Configured, stateless scorer. One instance serves a whole cycle.
pub struct CreditScorer {
    config: RiskConfig,
}

impl CreditScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Score one feature vector. No side effects beyond the returned record.
    pub fn score(&self, features: &FeatureVector) -> RkResult<RiskScoreRecord> {
        let mut flags = features.flags.clone();

        let financial = self.financial_capacity(features, &mut flags);
        let payment = self.payment_behavior(features);
        let relationship = self.relationship_stability(features);

        let macro_multiplier = match features.macro_observation {
            Some(observation) => self
                .config
                .macro_bands
                .multiplier_for(observation.unemployment_rate, observation.gdp_growth),
            // MACRO_DATA_MISSING was already flagged by the aggregator.
            None => self.config.macro_bands.neutral_multiplier,
        };

        let raw = (financial + payment + relationship) as f64 * macro_multiplier;
        let composite_score = (raw.round() as i64)
            .clamp(COMPOSITE_MIN as i64, COMPOSITE_MAX as i64) as u32;

        let probability_of_default = self.probability_of_default(composite_score);
        if !(probability_of_default > 0.0 && probability_of_default < 1.0) {
            return Err(ScoringError::InvalidRange {
                field: "probability_of_default",
                value: probability_of_default,
                range: "(0, 1)",
            }
            .into());
        }

        let credit_rating = self.config.rating_thresholds.rating_for(composite_score);

        let coverage = deposit_coverage(features);
        let loss_given_default = self.config.lgd_bands.lgd_for(coverage);
        if !(0.0..=1.0).contains(&loss_given_default) {
            return Err(ScoringError::InvalidRange {
                field: "loss_given_default",
                value: loss_given_default,
                range: "[0, 1]",
            }
            .into());
        }

        let exposure = features.outstanding_debt.max(Decimal::ZERO);
        let expected_loss = exposure
            * Decimal::from_f64_retain(probability_of_default * loss_given_default)
                .unwrap_or_default();
        if expected_loss < Decimal::ZERO {
            return Err(ScoringError::InvalidRange {
                field: "expected_loss",
                value: expected_loss.to_f64().unwrap_or(f64::NAN),
                range: "[0, ∞)",
            }
            .into());
        }

        let allocated_capital = exposure * self.config.capital.base_capital_ratio;
        let risk_adjusted_return = if allocated_capital > Decimal::ZERO {
            Some((features.interest_income - expected_loss) / allocated_capital)
        } else {
            flags.raise(DataQualityFlag::UndefinedRatio);
            None
        };

        debug!(
            customer = %features.customer_id,
            composite_score,
            pd = probability_of_default,
            rating = %credit_rating,
            "customer scored"
        );

        Ok(RiskScoreRecord {
            id: Uuid::new_v4(),
            customer_id: features.customer_id,
            as_of: features.as_of,
            computed_at: Utc::now(),
            segment: features.segment,
            financial_capacity_score: financial,
            payment_behavior_score: payment,
            relationship_stability_score: relationship,
            composite_score,
            macro_multiplier,
            probability_of_default,
            loss_given_default,
            expected_loss,
            exposure,
            credit_rating,
            risk_adjusted_return,
            flags,
        })
    }

    /// Logistic transform of the composite score. Strictly decreasing.
    pub fn probability_of_default(&self, composite_score: u32) -> f64 {
        let curve = &self.config.pd_curve;
        1.0 / (1.0 + ((composite_score as f64 - curve.center) / curve.scale).exp())
    }

    fn financial_capacity(&self, features: &FeatureVector, flags: &mut QualityFlags) -> u32 {
        let weights: &FinancialCapacityWeights = &self.config.scoring.financial;

        let income = features.annual_income.to_f64().unwrap_or(0.0).max(0.0);
        let mut income_term = weights.income.points_for(income);
        if features.employment_status.has_stable_income() {
            income_term += weights.stable_employment_bonus;
        }

        let debt = features.outstanding_debt.to_f64().unwrap_or(0.0);
        let dti_term = if income > 0.0 {
            weights.debt_to_income.points_for(debt / income)
        } else if debt > 0.0 {
            // Debt with no income: the ratio is undefined, score nothing.
            flags.raise(DataQualityFlag::UndefinedRatio);
            0
        } else {
            weights.debt_to_income.points_for(0.0)
        };

        let liquidity_term = match deposit_coverage(features) {
            Some(coverage) => weights.liquidity_buffer.points_for(coverage),
            // No debt to cover: best band (the catch-all).
            None => weights.liquidity_buffer.points_for(f64::INFINITY),
        };

        (income_term + dti_term + liquidity_term).min(weights.cap)
    }

    fn payment_behavior(&self, features: &FeatureVector) -> u32 {
        let weights: &PaymentBehaviorWeights = &self.config.scoring.payment;

        // No credit facilities and no transaction activity: there is no
        // payment behaviour to score.
        let has_credit_history = features.credit_limit > Decimal::ZERO
            || features.outstanding_debt > Decimal::ZERO
            || features.max_days_past_due > 0;
        if !has_credit_history && features.txn_count == 0 {
            return 0;
        }

        let severity_term = weights
            .delinquency_severity
            .points_for(features.max_days_past_due as f64);

        let frequency_term = weights.frequency_base.saturating_sub(
            features.dpd_30_count * weights.dpd_30_penalty
                + features.dpd_60_count * weights.dpd_60_penalty
                + features.dpd_90_count * weights.dpd_90_penalty,
        );

        // Undefined utilization was flagged upstream; it scores nothing here.
        let utilization_term = features
            .utilization
            .map(|u| weights.utilization.points_for(u))
            .unwrap_or(0);

        let behavioural_penalty = features.overdraft_count * weights.overdraft_penalty
            + features.large_withdrawal_count * weights.large_withdrawal_penalty
            + features.restricted_category_count * weights.restricted_category_penalty;

        (severity_term + frequency_term + utilization_term)
            .min(weights.cap)
            .saturating_sub(behavioural_penalty)
    }

    fn relationship_stability(&self, features: &FeatureVector) -> u32 {
        let weights: &RelationshipStabilityWeights = &self.config.scoring.relationship;
        let tenure_term = weights.tenure.points_for(features.tenure_years as f64);
        let diversity_term = weights
            .product_diversity
            .points_for(features.product_diversity as f64);
        let activity_term = weights.activity.points_for(features.active_months as f64);
        (tenure_term + diversity_term + activity_term).min(weights.cap)
    }
}

/// Liquid deposits / outstanding debt. `None` when there is no debt.
fn deposit_coverage(features: &FeatureVector) -> Option<f64> {
    if features.outstanding_debt > Decimal::ZERO {
        let deposits = features.liquid_deposits.to_f64().unwrap_or(0.0);
        let debt = features.outstanding_debt.to_f64().unwrap_or(f64::MAX);
        Some(deposits / debt)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rk_types::{CustomerSegment, EmploymentStatus, MacroObservation};
    use rust_decimal_macros::dec;

    fn base_features() -> FeatureVector {
        FeatureVector {
            customer_id: Uuid::new_v4(),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            segment: CustomerSegment::Retail,
            employment_status: EmploymentStatus::Employed,
            tenure_years: 6,
            annual_income: dec!(80_000),
            liquid_deposits: dec!(20_000),
            outstanding_debt: dec!(15_000),
            credit_limit: dec!(50_000),
            utilization: Some(0.30),
            interest_income: dec!(900),
            dpd_30_count: 0,
            dpd_60_count: 0,
            dpd_90_count: 0,
            max_days_past_due: 0,
            txn_count: 120,
            txn_mean: dec!(250),
            txn_stddev: dec!(90),
            active_months: 12,
            product_diversity: 2,
            overdraft_count: 0,
            large_withdrawal_count: 0,
            restricted_category_count: 0,
            macro_observation: Some(MacroObservation {
                unemployment_rate: 0.05,
                gdp_growth: 0.02,
                interest_rate: 0.04,
            }),
            flags: QualityFlags::new(),
        }
    }

    fn scorer() -> CreditScorer {
        CreditScorer::new(RiskConfig::default())
    }

    #[test]
    fn pd_strictly_decreasing_in_composite_score() {
        let scorer = scorer();
        let mut previous = scorer.probability_of_default(0);
        for score in (10..=1000).step_by(10) {
            let pd = scorer.probability_of_default(score);
            assert!(
                pd < previous,
                "PD not decreasing at score {score}: {pd} >= {previous}"
            );
            previous = pd;
        }
    }

    #[test]
    fn pd_at_center_is_one_half() {
        let pd = scorer().probability_of_default(500);
        assert!((pd - 0.5).abs() < 1e-12);
    }

    #[test]
    fn pd_always_in_open_unit_interval() {
        let scorer = scorer();
        for score in [0, 1, 499, 500, 501, 999, 1000] {
            let pd = scorer.probability_of_default(score);
            assert!(pd > 0.0 && pd < 1.0, "PD {pd} out of range at {score}");
        }
    }

    #[test]
    fn sub_scores_respect_caps_and_composite_bounds() {
        let mut features = base_features();
        // Best case everywhere, plus a boom multiplier.
        features.annual_income = dec!(500_000);
        features.liquid_deposits = dec!(400_000);
        features.outstanding_debt = dec!(10_000);
        features.utilization = Some(0.05);
        features.tenure_years = 20;
        features.product_diversity = 5;
        features.active_months = 12;
        features.macro_observation = Some(MacroObservation {
            unemployment_rate: 0.03,
            gdp_growth: 0.05,
            interest_rate: 0.02,
        });

        let record = scorer().score(&features).unwrap();
        assert!(record.financial_capacity_score <= 300);
        assert!(record.payment_behavior_score <= 400);
        assert!(record.relationship_stability_score <= 300);
        assert_eq!(record.macro_multiplier, 1.08);
        assert!(record.composite_score <= COMPOSITE_MAX);
    }

    #[test]
    fn stress_multiplier_lowers_composite() {
        let mut features = base_features();
        let neutral = scorer().score(&features).unwrap();

        features.macro_observation = Some(MacroObservation {
            unemployment_rate: 0.10,
            gdp_growth: -0.02,
            interest_rate: 0.06,
        });
        let stressed = scorer().score(&features).unwrap();

        assert_eq!(stressed.macro_multiplier, 0.85);
        assert!(stressed.composite_score < neutral.composite_score);
        // Lower score, higher PD.
        assert!(stressed.probability_of_default > neutral.probability_of_default);
    }

    #[test]
    fn zero_debt_zero_activity_scores_capacity_and_relationship_only() {
        let mut features = base_features();
        features.outstanding_debt = Decimal::ZERO;
        features.credit_limit = Decimal::ZERO;
        features.utilization = None;
        features.flags.raise(DataQualityFlag::UndefinedRatio);
        features.interest_income = Decimal::ZERO;
        features.txn_count = 0;
        features.active_months = 0;
        features.overdraft_count = 0;

        let record = scorer().score(&features).unwrap();
        assert_eq!(record.payment_behavior_score, 0);
        assert!(record.financial_capacity_score > 0);
        assert!(record.relationship_stability_score > 0);
        assert_eq!(
            record.composite_score,
            record.financial_capacity_score + record.relationship_stability_score
        );
        assert_eq!(record.expected_loss, Decimal::ZERO);
        assert!(record.flags.contains(DataQualityFlag::UndefinedRatio));
        // No exposure, no allocated capital, no RAROC.
        assert_eq!(record.risk_adjusted_return, None);
    }

    #[test]
    fn expected_loss_is_pd_times_lgd_times_exposure() {
        let features = base_features();
        let record = scorer().score(&features).unwrap();

        // Coverage 20k / 15k > 1.0: best LGD tier.
        assert_eq!(record.loss_given_default, 0.15);
        let expected = features.outstanding_debt
            * Decimal::from_f64_retain(record.probability_of_default * 0.15).unwrap();
        assert_eq!(record.expected_loss, expected);
        assert!(record.expected_loss >= Decimal::ZERO);
    }

    #[test]
    fn uncovered_borrower_gets_floor_lgd() {
        let mut features = base_features();
        features.liquid_deposits = dec!(500);
        features.outstanding_debt = dec!(50_000);
        let record = scorer().score(&features).unwrap();
        assert_eq!(record.loss_given_default, 0.65);
    }

    #[test]
    fn behavioural_penalties_reduce_payment_score_to_floor() {
        let mut features = base_features();
        let clean = scorer().score(&features).unwrap();

        features.overdraft_count = 10;
        features.restricted_category_count = 10;
        let risky = scorer().score(&features).unwrap();
        assert!(risky.payment_behavior_score < clean.payment_behavior_score);

        // Penalties can exhaust the sub-score but never underflow it.
        features.overdraft_count = 1000;
        let floored = scorer().score(&features).unwrap();
        assert_eq!(floored.payment_behavior_score, 0);
    }

    #[test]
    fn raroc_uses_interest_income_minus_expected_loss() {
        let features = base_features();
        let record = scorer().score(&features).unwrap();
        let allocated = features.outstanding_debt * dec!(0.08);
        let expected = (features.interest_income - record.expected_loss) / allocated;
        assert_eq!(record.risk_adjusted_return, Some(expected));
    }

    #[test]
    fn missing_macro_scores_with_neutral_multiplier() {
        let mut features = base_features();
        features.macro_observation = None;
        features.flags.raise(DataQualityFlag::MacroDataMissing);
        let record = scorer().score(&features).unwrap();
        assert_eq!(record.macro_multiplier, 1.0);
        assert!(record.flags.contains(DataQualityFlag::MacroDataMissing));
    }
}
