//! Feature aggregation: raw records to a per-customer feature vector.
//!
//! Soft-fail contract: missing macro data substitutes the neutral multiplier
//! downstream and raises `MACRO_DATA_MISSING`; an empty transaction history
//! yields zeroed behavioural fields; a zero credit limit leaves utilization
//! undefined and raises `UNDEFINED_RATIO`. None of these abort aggregation.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

use rk_data::SourceSnapshot;
use rk_types::config::EngineSettings;
use rk_types::{
    CustomerId, DataQualityFlag, FeatureVector, MacroObservation, ProductType, QualityFlags,
    RkResult, TransactionKind,
};

/// Stateless aggregator over one source snapshot.
pub struct FeatureAggregator<'a> {
    snapshot: &'a SourceSnapshot,
    settings: &'a EngineSettings,
}

impl<'a> FeatureAggregator<'a> {
    pub fn new(snapshot: &'a SourceSnapshot, settings: &'a EngineSettings) -> Self {
        Self { snapshot, settings }
    }

    /// Build the feature vector for one customer at the snapshot's as-of
    /// date. Pure function of the snapshot: identical inputs, identical
    /// output.
    pub fn aggregate(&self, customer_id: CustomerId) -> RkResult<FeatureVector> {
        let as_of = self.snapshot.as_of();
        let customer = self.snapshot.customer(customer_id)?;
        let mut flags = QualityFlags::new();

        // --- deposits & product mix ---
        let accounts = self.snapshot.accounts_for(customer_id);
        let liquid_deposits: Decimal = accounts
            .iter()
            .filter(|a| a.product.is_liquid())
            .map(|a| a.balance.max(Decimal::ZERO))
            .sum();
        let product_diversity = accounts
            .iter()
            .map(|a| a.product)
            .collect::<BTreeSet<ProductType>>()
            .len() as u32;

        // --- loan exposure & delinquency ---
        let open_loans: Vec<_> = self
            .snapshot
            .loans_for(customer_id)
            .iter()
            .filter(|l| l.originated_at <= as_of)
            .collect();
        let outstanding_debt: Decimal = open_loans
            .iter()
            .map(|l| l.outstanding_balance.max(Decimal::ZERO))
            .sum();
        let credit_limit: Decimal = open_loans.iter().map(|l| l.credit_limit).sum();
        let interest_income: Decimal = open_loans
            .iter()
            .map(|l| l.outstanding_balance.max(Decimal::ZERO) * l.interest_rate)
            .sum();

        let utilization = if credit_limit > Decimal::ZERO {
            Some(
                (outstanding_debt / credit_limit)
                    .to_f64()
                    .unwrap_or(0.0),
            )
        } else {
            flags.raise(DataQualityFlag::UndefinedRatio);
            None
        };

        let mut dpd_30_count = 0;
        let mut dpd_60_count = 0;
        let mut dpd_90_count = 0;
        let mut max_days_past_due = 0;
        for loan in &open_loans {
            match loan.days_past_due {
                30..=59 => dpd_30_count += 1,
                60..=89 => dpd_60_count += 1,
                90.. => dpd_90_count += 1,
                _ => {}
            }
            max_days_past_due = max_days_past_due.max(loan.days_past_due);
        }

        // --- 12-month transaction statistics ---
        let window_start = (as_of - Duration::days(self.settings.txn_lookback_days))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let window_end = as_of
            .and_hms_opt(23, 59, 59)
            .unwrap_or_default()
            .and_utc();
        let txns = self
            .snapshot
            .transactions_for(customer_id, window_start, window_end);

        let txn_count = txns.len() as u32;
        let amounts: Vec<Decimal> = txns.iter().map(|t| t.amount.abs()).collect();
        let (txn_mean, txn_stddev) = mean_and_stddev(&amounts);
        let active_months = txns
            .iter()
            .map(|t| {
                let d = t.timestamp.date_naive();
                (d.year(), d.month())
            })
            .collect::<BTreeSet<(i32, u32)>>()
            .len() as u32;

        // --- behavioural risk counters ---
        let mut overdraft_count = 0;
        let mut large_withdrawal_count = 0;
        let mut restricted_category_count = 0;
        for txn in &txns {
            if txn.kind == TransactionKind::Overdraft {
                overdraft_count += 1;
            }
            if txn.kind == TransactionKind::Withdrawal
                && txn.amount.abs() >= self.settings.large_withdrawal_threshold
            {
                large_withdrawal_count += 1;
            }
            if let Some(category) = &txn.merchant_category {
                if self.settings.restricted_categories.contains(category) {
                    restricted_category_count += 1;
                }
            }
        }

        // --- macro context ---
        let macro_observation = match self.snapshot.macro_for(&customer.country, as_of) {
            Some(indicator) => Some(MacroObservation {
                unemployment_rate: indicator.unemployment_rate,
                gdp_growth: indicator.gdp_growth,
                interest_rate: indicator.interest_rate,
            }),
            None => {
                flags.raise(DataQualityFlag::MacroDataMissing);
                None
            }
        };

        Ok(FeatureVector {
            customer_id,
            as_of,
            segment: customer.segment,
            employment_status: customer.employment_status,
            tenure_years: customer.tenure_years(as_of),
            annual_income: customer.annual_income,
            liquid_deposits,
            outstanding_debt,
            credit_limit,
            utilization,
            interest_income,
            dpd_30_count,
            dpd_60_count,
            dpd_90_count,
            max_days_past_due,
            txn_count,
            txn_mean,
            txn_stddev,
            active_months,
            product_diversity,
            overdraft_count,
            large_withdrawal_count,
            restricted_category_count,
            macro_observation,
            flags,
        })
    }
}

/// Mean and sample standard deviation of transaction amounts.
///
/// Stddev goes through f64 for the square root and back, same as every other
/// statistical intermediate in the engine.
fn mean_and_stddev(amounts: &[Decimal]) -> (Decimal, Decimal) {
    if amounts.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let count = Decimal::from(amounts.len());
    let mean = amounts.iter().copied().sum::<Decimal>() / count;
    if amounts.len() < 2 {
        return (mean, Decimal::ZERO);
    }
    let variance = amounts
        .iter()
        .map(|a| {
            let diff = (*a - mean).to_f64().unwrap_or(0.0);
            diff * diff
        })
        .sum::<f64>()
        / (amounts.len() - 1) as f64;
    let stddev = Decimal::from_f64_retain(variance.sqrt()).unwrap_or_default();
    (mean, stddev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rk_types::{
        Account, Customer, CustomerSegment, EmploymentStatus, Loan, MacroIndicator, Transaction,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(id: CustomerId) -> Customer {
        Customer {
            id,
            segment: CustomerSegment::Retail,
            country: "US".into(),
            industry: "services".into(),
            annual_income: dec!(60_000),
            employment_status: EmploymentStatus::Employed,
            created_at: date(2018, 1, 1),
            archived_at: None,
        }
    }

    fn loan(customer_id: CustomerId, outstanding: Decimal, limit: Decimal, dpd: u32) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            customer_id,
            outstanding_balance: outstanding,
            credit_limit: limit,
            interest_rate: dec!(0.06),
            days_past_due: dpd,
            originated_at: date(2021, 1, 1),
            matures_at: date(2028, 1, 1),
        }
    }

    fn txn(
        customer_id: CustomerId,
        account_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        category: Option<&str>,
        when: (i32, u32, u32),
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            customer_id,
            account_id,
            amount,
            kind,
            merchant_category: category.map(String::from),
            timestamp: Utc
                .with_ymd_and_hms(when.0, when.1, when.2, 12, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn zero_history_customer_gets_zeroed_fields_and_flag() {
        let id = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(id))
            .build()
            .unwrap();
        let settings = EngineSettings::default();
        let features = FeatureAggregator::new(&snapshot, &settings)
            .aggregate(id)
            .unwrap();

        assert_eq!(features.txn_count, 0);
        assert_eq!(features.txn_mean, Decimal::ZERO);
        assert_eq!(features.active_months, 0);
        assert_eq!(features.outstanding_debt, Decimal::ZERO);
        assert_eq!(features.utilization, None);
        assert!(features.flags.contains(DataQualityFlag::UndefinedRatio));
        assert!(features.flags.contains(DataQualityFlag::MacroDataMissing));
    }

    #[test]
    fn utilization_and_delinquency_buckets() {
        let id = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(id))
            .loan(loan(id, dec!(4_000), dec!(10_000), 0))
            .loan(loan(id, dec!(2_000), dec!(5_000), 45))
            .loan(loan(id, dec!(1_000), dec!(5_000), 95))
            .build()
            .unwrap();
        let settings = EngineSettings::default();
        let features = FeatureAggregator::new(&snapshot, &settings)
            .aggregate(id)
            .unwrap();

        assert_eq!(features.outstanding_debt, dec!(7_000));
        assert_eq!(features.credit_limit, dec!(20_000));
        assert!((features.utilization.unwrap() - 0.35).abs() < 1e-12);
        assert_eq!(features.dpd_30_count, 1);
        assert_eq!(features.dpd_60_count, 0);
        assert_eq!(features.dpd_90_count, 1);
        assert_eq!(features.max_days_past_due, 95);
        // 7000 * 6%
        assert_eq!(features.interest_income, dec!(420.00));
    }

    #[test]
    fn behavioural_counters_respect_window_and_thresholds() {
        let id = Uuid::new_v4();
        let account = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(id))
            .account(Account {
                id: account,
                customer_id: id,
                product: ProductType::Checking,
                balance: dec!(3_000),
                opened_at: date(2020, 1, 1),
            })
            // In-window events
            .transaction(txn(id, account, dec!(-12_000), TransactionKind::Withdrawal, None, (2024, 5, 10)))
            .transaction(txn(id, account, dec!(-50), TransactionKind::Overdraft, None, (2024, 4, 2)))
            .transaction(txn(id, account, dec!(-200), TransactionKind::Payment, Some("gambling"), (2024, 3, 15)))
            // Small withdrawal: not large
            .transaction(txn(id, account, dec!(-500), TransactionKind::Withdrawal, None, (2024, 2, 1)))
            // Outside the 12-month window
            .transaction(txn(id, account, dec!(-20_000), TransactionKind::Withdrawal, None, (2022, 1, 1)))
            .build()
            .unwrap();
        let settings = EngineSettings::default();
        let features = FeatureAggregator::new(&snapshot, &settings)
            .aggregate(id)
            .unwrap();

        assert_eq!(features.txn_count, 4);
        assert_eq!(features.large_withdrawal_count, 1);
        assert_eq!(features.overdraft_count, 1);
        assert_eq!(features.restricted_category_count, 1);
        assert_eq!(features.active_months, 4);
    }

    #[test]
    fn macro_observation_attached_when_present() {
        let id = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(id))
            .macro_indicator(MacroIndicator {
                country: "US".into(),
                month: date(2024, 6, 1),
                unemployment_rate: 0.09,
                gdp_growth: -0.01,
                interest_rate: 0.05,
            })
            .build()
            .unwrap();
        let settings = EngineSettings::default();
        let features = FeatureAggregator::new(&snapshot, &settings)
            .aggregate(id)
            .unwrap();

        let observation = features.macro_observation.unwrap();
        assert_eq!(observation.unemployment_rate, 0.09);
        assert!(!features.flags.contains(DataQualityFlag::MacroDataMissing));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let id = Uuid::new_v4();
        let account = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(id))
            .account(Account {
                id: account,
                customer_id: id,
                product: ProductType::Savings,
                balance: dec!(8_000),
                opened_at: date(2019, 1, 1),
            })
            .loan(loan(id, dec!(3_000), dec!(9_000), 10))
            .transaction(txn(id, account, dec!(250), TransactionKind::Deposit, None, (2024, 6, 1)))
            .build()
            .unwrap();
        let settings = EngineSettings::default();
        let aggregator = FeatureAggregator::new(&snapshot, &settings);
        let first = aggregator.aggregate(id).unwrap();
        let second = aggregator.aggregate(id).unwrap();
        assert_eq!(first, second);
    }
}
