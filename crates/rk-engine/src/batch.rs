//! Parallel per-entity execution with failure isolation.
//!
//! Work items run on the rayon pool and report back over a crossbeam
//! channel. Deadlines are cooperative: pipeline stages check the deadline
//! between steps and bail out with a timeout error, nothing is preempted
//! mid-computation.

use crossbeam_channel::unbounded;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use uuid::Uuid;

use rk_types::{MeasurementError, RiskError, RkResult, ScoringError};

/// Cooperative per-entity deadline.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            budget: Duration::from_millis(budget_ms),
        }
    }

    pub fn exceeded(&self) -> bool {
        self.started.elapsed() > self.budget
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

/// Result of one entity's trip through a pipeline.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed { entity_id: Uuid, record: T },
    Failed { entity_id: Uuid, error: String },
    TimedOut { entity_id: Uuid, elapsed_ms: u128 },
}

impl<T> Outcome<T> {
    pub fn entity_id(&self) -> Uuid {
        match self {
            Outcome::Completed { entity_id, .. }
            | Outcome::Failed { entity_id, .. }
            | Outcome::TimedOut { entity_id, .. } => *entity_id,
        }
    }
}

/// Run `work` for every entity on the rayon pool.
///
/// Each entity gets a fresh [`Deadline`]. Timeout errors surfaced by the
/// pipeline become [`Outcome::TimedOut`], any other error becomes
/// [`Outcome::Failed`], and no outcome ever aborts its siblings. Outcomes
/// are returned sorted by entity id so the caller's append order is
/// deterministic regardless of worker scheduling.
pub fn run_batch<T, F>(entity_ids: &[Uuid], budget_ms: u64, work: F) -> Vec<Outcome<T>>
where
    T: Send,
    F: Fn(Uuid, &Deadline) -> RkResult<T> + Sync,
{
    let (tx, rx) = unbounded();

    entity_ids.par_iter().for_each_with(tx, |tx, &entity_id| {
        let deadline = Deadline::new(budget_ms);
        let outcome = match work(entity_id, &deadline) {
            Ok(record) => Outcome::Completed { entity_id, record },
            Err(RiskError::Scoring(ScoringError::Timeout { elapsed_ms, .. }))
            | Err(RiskError::Measurement(MeasurementError::Timeout { elapsed_ms, .. })) => {
                Outcome::TimedOut {
                    entity_id,
                    elapsed_ms,
                }
            }
            Err(error) => Outcome::Failed {
                entity_id,
                error: error.to_string(),
            },
        };
        // Receiver outlives the pool; a send can only fail on caller panic.
        let _ = tx.send(outcome);
    });

    let mut outcomes: Vec<Outcome<T>> = rx.into_iter().collect();
    outcomes.sort_by_key(Outcome::entity_id);
    outcomes
}
