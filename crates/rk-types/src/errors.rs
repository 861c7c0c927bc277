use thiserror::Error;

/// Main error type for the risk analytics engine
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading or validating source data
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Customer not found: {customer_id}")]
    CustomerNotFound { customer_id: String },

    #[error("Portfolio not found: {portfolio_id}")]
    PortfolioNotFound { portfolio_id: String },

    #[error("Instrument not found: {instrument_id}")]
    InstrumentNotFound { instrument_id: String },

    #[error("Missing required data: {message}")]
    MissingData { message: String },

    #[error("Orphan row references missing entity: {message}")]
    OrphanReference { message: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Feed parsing error: {message}")]
    ParseError { message: String },

    #[error(
        "Out-of-order append for entity {entity_id}: as-of {as_of} is not after {high_water}"
    )]
    NonMonotonicAppend {
        entity_id: String,
        as_of: String,
        high_water: String,
    },
}

/// Errors raised by the credit scoring pipeline
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Derived field {field} out of range: {value} not in {range}")]
    InvalidRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("Scoring timed out for customer {customer_id} after {elapsed_ms}ms")]
    Timeout { customer_id: String, elapsed_ms: u128 },
}

/// Errors raised by the market risk engine
#[derive(Error, Debug)]
pub enum MeasurementError {
    #[error("Insufficient sample: {observed} observations, {required} required")]
    InsufficientSample { observed: usize, required: usize },

    #[error("Asset-class weights sum to {sum}, expected 1.0")]
    WeightsNotNormalized { sum: f64 },

    #[error("Unknown stress scenario: {name}")]
    UnknownScenario { name: String },

    #[error("Measurement timed out for portfolio {portfolio_id} after {elapsed_ms}ms")]
    Timeout {
        portfolio_id: String,
        elapsed_ms: u128,
    },
}

/// Result type alias for risk engine operations
pub type RkResult<T> = Result<T, RiskError>;
