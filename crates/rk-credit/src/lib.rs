//! Credit risk pipeline: feature aggregation and composite scoring.
//!
//! [`FeatureAggregator`] rolls raw records into a per-customer
//! [`rk_types::FeatureVector`]; [`CreditScorer`] turns that vector into a
//! [`rk_types::RiskScoreRecord`]. Both stages are pure functions of the
//! source snapshot, so re-running a cycle on identical inputs reproduces
//! identical output.

pub mod features;
pub mod scorer;

pub use features::FeatureAggregator;
pub use scorer::CreditScorer;
