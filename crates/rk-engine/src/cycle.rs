//! Scoring and measurement cycles.
//!
//! A cycle takes one source snapshot, runs every entity through its
//! pipeline, appends the surviving records to the store in sorted order and
//! returns a [`CycleReport`] of what happened.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use chrono::NaiveDate;
use rk_credit::{CreditScorer, FeatureAggregator};
use rk_data::{OutputStore, SourceSnapshot};
use rk_market::MarketRiskEngine;
use rk_types::{MeasurementError, RiskConfig, RkResult, ScoringError};

use crate::batch::{run_batch, Outcome};

/// One entity that produced no record this cycle and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleException {
    pub entity_id: Uuid,
    pub reason: String,
}

/// Summary of one scoring or measurement cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub as_of: NaiveDate,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub exceptions: Vec<CycleException>,
}

impl CycleReport {
    fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            completed: 0,
            failed: 0,
            timed_out: 0,
            exceptions: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.completed + self.failed + self.timed_out
    }
}

/// Scores every customer in the snapshot and appends the records.
#[derive(Debug, Clone)]
pub struct ScoringCycle {
    config: RiskConfig,
}

impl ScoringCycle {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, snapshot: &SourceSnapshot, store: &OutputStore) -> RkResult<CycleReport> {
        // Archived customers keep their history but are not rescored.
        let ids = snapshot.active_customer_ids();
        info!(
            customers = ids.len(),
            as_of = %snapshot.as_of(),
            "scoring cycle started"
        );

        let scorer = CreditScorer::new(self.config.clone());
        let aggregator = FeatureAggregator::new(snapshot, &self.config.engine);

        let outcomes = run_batch(&ids, self.config.engine.entity_timeout_ms, |id, deadline| {
            let features = aggregator.aggregate(id)?;
            if deadline.exceeded() {
                return Err(ScoringError::Timeout {
                    customer_id: id.to_string(),
                    elapsed_ms: deadline.elapsed_ms(),
                }
                .into());
            }
            scorer.score(&features)
        });

        let report = collect(snapshot.as_of(), outcomes, |record| {
            store.append_score(record)
        });
        info!(
            completed = report.completed,
            failed = report.failed,
            timed_out = report.timed_out,
            "scoring cycle finished"
        );
        Ok(report)
    }
}

/// Measures every portfolio in the snapshot and appends the records.
#[derive(Debug, Clone)]
pub struct MeasurementCycle {
    config: RiskConfig,
}

impl MeasurementCycle {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, snapshot: &SourceSnapshot, store: &OutputStore) -> RkResult<CycleReport> {
        let ids = snapshot.portfolio_ids();
        info!(
            portfolios = ids.len(),
            as_of = %snapshot.as_of(),
            "measurement cycle started"
        );

        let engine = MarketRiskEngine::new(self.config.clone());

        let outcomes = run_batch(&ids, self.config.engine.entity_timeout_ms, |id, deadline| {
            let measurement = engine.measure(snapshot, id)?;
            if deadline.exceeded() {
                return Err(MeasurementError::Timeout {
                    portfolio_id: id.to_string(),
                    elapsed_ms: deadline.elapsed_ms(),
                }
                .into());
            }
            Ok(measurement)
        });

        let report = collect(snapshot.as_of(), outcomes, |record| {
            store.append_measurement(record)
        });
        info!(
            completed = report.completed,
            failed = report.failed,
            timed_out = report.timed_out,
            "measurement cycle finished"
        );
        Ok(report)
    }
}

/// Fold sorted outcomes into the store and a report. Append errors (for
/// example a non-monotonic as-of) demote the entity to failed.
fn collect<T, F>(as_of: NaiveDate, outcomes: Vec<Outcome<T>>, mut append: F) -> CycleReport
where
    F: FnMut(T) -> RkResult<()>,
{
    let mut report = CycleReport::new(as_of);
    for outcome in outcomes {
        match outcome {
            Outcome::Completed { entity_id, record } => match append(record) {
                Ok(()) => report.completed += 1,
                Err(error) => {
                    warn!(%entity_id, %error, "append rejected");
                    report.failed += 1;
                    report.exceptions.push(CycleException {
                        entity_id,
                        reason: error.to_string(),
                    });
                }
            },
            Outcome::Failed { entity_id, error } => {
                warn!(%entity_id, %error, "entity failed");
                report.failed += 1;
                report.exceptions.push(CycleException {
                    entity_id,
                    reason: error,
                });
            }
            Outcome::TimedOut {
                entity_id,
                elapsed_ms,
            } => {
                warn!(%entity_id, elapsed_ms, "entity timed out");
                report.timed_out += 1;
                report.exceptions.push(CycleException {
                    entity_id,
                    reason: format!("timed out after {elapsed_ms}ms"),
                });
            }
        }
    }
    report
}
