//! Credit portfolio roll-up.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use rk_types::{
    CapitalPolicy, CreditRating, CustomerId, CustomerSegment, QualityFlags, RiskScoreRecord,
};

/// One (segment, rating) bucket of the credit book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReportRow {
    pub segment: CustomerSegment,
    pub rating: CreditRating,
    pub customer_count: usize,
    pub exposure: Decimal,
    pub expected_loss: Decimal,
    /// Expected loss as a fraction of exposure. `None` for zero-exposure
    /// buckets.
    pub el_rate: Option<f64>,
    /// Bucket exposure as a fraction of total book exposure.
    pub concentration_share: f64,
    /// Basel-style capital: exposure × base ratio × rating risk weight.
    pub required_capital: Decimal,
}

/// Segment-and-rating roll-up of one scoring cycle's output.
///
/// Rows are ordered by (segment, rating), so the report is byte-identical
/// across runs on the same input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditPortfolioReport {
    pub as_of: NaiveDate,
    pub rows: Vec<CreditReportRow>,
    pub total_exposure: Decimal,
    pub total_expected_loss: Decimal,
    pub total_required_capital: Decimal,
}

/// Records excluded from the roll-up because a fatal quality flag was
/// raised, ordered by customer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditExceptions {
    pub as_of: NaiveDate,
    pub entries: Vec<CreditExceptionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditExceptionEntry {
    pub customer_id: CustomerId,
    pub segment: CustomerSegment,
    pub flags: QualityFlags,
}

/// Aggregates scored records into [`CreditPortfolioReport`]s.
#[derive(Debug, Clone)]
pub struct CreditReporter {
    capital: CapitalPolicy,
}

impl CreditReporter {
    pub fn new(capital: CapitalPolicy) -> Self {
        Self { capital }
    }

    /// Roll one cycle's records up by (segment, rating).
    ///
    /// Fatal-flagged records are kept out of every total and returned in the
    /// exceptions report instead.
    pub fn roll_up(
        &self,
        as_of: NaiveDate,
        records: &[RiskScoreRecord],
    ) -> (CreditPortfolioReport, CreditExceptions) {
        use std::collections::BTreeMap;

        let mut exceptions: Vec<CreditExceptionEntry> = Vec::new();
        let mut buckets: BTreeMap<(CustomerSegment, CreditRating), Vec<&RiskScoreRecord>> =
            BTreeMap::new();

        for record in records {
            if record.flags.is_fatal() {
                warn!(
                    customer_id = %record.customer_id,
                    "record excluded from roll-up by fatal quality flag"
                );
                exceptions.push(CreditExceptionEntry {
                    customer_id: record.customer_id,
                    segment: record.segment,
                    flags: record.flags.clone(),
                });
                continue;
            }
            buckets
                .entry((record.segment, record.credit_rating))
                .or_default()
                .push(record);
        }
        exceptions.sort_by_key(|e| e.customer_id);

        let total_exposure: Decimal = buckets
            .values()
            .flatten()
            .map(|r| r.exposure)
            .sum();

        let mut rows = Vec::with_capacity(buckets.len());
        for ((segment, rating), bucket) in &buckets {
            let exposure: Decimal = bucket.iter().map(|r| r.exposure).sum();
            let expected_loss: Decimal = bucket.iter().map(|r| r.expected_loss).sum();

            let el_rate = if exposure > Decimal::ZERO {
                (expected_loss / exposure).to_f64()
            } else {
                None
            };
            let concentration_share = if total_exposure > Decimal::ZERO {
                (exposure / total_exposure).to_f64().unwrap_or(0.0)
            } else {
                0.0
            };
            let risk_weight = self
                .capital
                .risk_weights
                .get(rating)
                .copied()
                .unwrap_or(Decimal::ONE);

            rows.push(CreditReportRow {
                segment: *segment,
                rating: *rating,
                customer_count: bucket.len(),
                exposure,
                expected_loss,
                el_rate,
                concentration_share,
                required_capital: exposure * self.capital.base_capital_ratio * risk_weight,
            });
        }

        let report = CreditPortfolioReport {
            as_of,
            total_exposure,
            total_expected_loss: rows.iter().map(|r| r.expected_loss).sum(),
            total_required_capital: rows.iter().map(|r| r.required_capital).sum(),
            rows,
        };
        (report, CreditExceptions {
            as_of,
            entries: exceptions,
        })
    }
}
