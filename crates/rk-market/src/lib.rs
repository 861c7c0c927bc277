//! Market risk measurement for portfolios.
//!
//! Provides:
//! - daily portfolio P&L reconstruction from positions and market data
//! - historical and parametric Value-at-Risk plus Expected Shortfall
//! - deterministic stress scenarios layered alongside VaR
//! - [`MarketRiskEngine`] tying the above into one
//!   [`rk_types::RiskMeasurement`] per portfolio per evaluation date

pub mod engine;
pub mod pnl;
pub mod stress;
pub mod var;

pub use engine::MarketRiskEngine;
pub use stress::StressTester;
