//! Capital and reporting aggregation.
//!
//! Rolls the append-only score and measurement histories up into portfolio
//! level reports. Aggregation is deterministic and idempotent: ordered maps
//! throughout, so identical inputs serialize to byte-identical JSON.
//! Records carrying fatal quality flags are excluded from totals and
//! surfaced separately as exceptions.

pub mod credit;
pub mod market;

pub use credit::{CreditExceptions, CreditPortfolioReport, CreditReporter};
pub use market::{MarketCapitalReport, MarketReporter};
