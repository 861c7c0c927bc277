//! Batch cycle orchestration.
//!
//! Partitions a source snapshot across a rayon worker pool, runs the credit
//! and market pipelines per entity under cooperative deadlines, and appends
//! outcomes to the output store in deterministic (sorted) order. One entity
//! failing or timing out never aborts the batch.

pub mod batch;
pub mod cycle;

pub use batch::{run_batch, Deadline, Outcome};
pub use cycle::{CycleReport, MeasurementCycle, ScoringCycle};
