//! Core types and data structures for the risk analytics engine.

pub mod config;
pub mod entities;
pub mod errors;
pub mod flags;
pub mod market;
pub mod records;

pub use config::{
    CapitalPolicy, EngineSettings, RiskConfig, StepTable, StressScenarios, VarSettings,
    SCENARIO_EQUITY_CRASH, SCENARIO_FLIGHT_TO_QUALITY, SCENARIO_RATES_SHOCK,
};
pub use entities::{
    Account, Customer, CustomerId, CustomerSegment, EmploymentStatus, Loan, MacroIndicator,
    ProductType, Transaction, TransactionKind,
};
pub use errors::{DataError, MeasurementError, RiskError, RkResult, ScoringError};
pub use flags::{DataQualityFlag, QualityFlags};
pub use market::{
    AssetClass, Instrument, InstrumentId, InstrumentType, MarketDataPoint, PortfolioId,
    PortfolioPosition,
};
pub use records::{
    CreditRating, FeatureVector, MacroObservation, RiskMeasurement, RiskScoreRecord, ScenarioResult,
};
