use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type InstrumentId = Uuid;
pub type PortfolioId = Uuid;

/// Asset classes used for stress-scenario bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    Equity,
    Bond,
    Fx,
    Commodity,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Equity => "Equity",
            AssetClass::Bond => "Bond",
            AssetClass::Fx => "Fx",
            AssetClass::Commodity => "Commodity",
        };
        write!(f, "{}", s)
    }
}

/// Instrument type as carried on the position feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Equity,
    Bond,
    Fx,
    Commodity,
}

impl InstrumentType {
    pub fn asset_class(&self) -> AssetClass {
        match self {
            InstrumentType::Equity => AssetClass::Equity,
            InstrumentType::Bond => AssetClass::Bond,
            InstrumentType::Fx => AssetClass::Fx,
            InstrumentType::Commodity => AssetClass::Commodity,
        }
    }
}

/// Tradable instrument referenced by portfolio positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub instrument_type: InstrumentType,
    pub currency: String,
    pub maturity: Option<NaiveDate>,
    pub country: String,
    pub sector: String,
    /// Modified duration in years. Only meaningful for bonds.
    pub duration: Option<Decimal>,
}

impl Instrument {
    /// Sensitivity of position P&L to the instrument's daily return.
    ///
    /// Linear factor model: 1.0 for equity/FX/commodity, modified duration
    /// for bonds. Bonds with no duration on the feed fall back to 1.0.
    pub fn risk_factor_sensitivity(&self) -> Decimal {
        match self.instrument_type {
            InstrumentType::Bond => self.duration.unwrap_or(Decimal::ONE),
            _ => Decimal::ONE,
        }
    }
}

/// One position held by a portfolio, revalued each valuation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub portfolio_id: PortfolioId,
    pub instrument_id: InstrumentId,
    pub quantity: Decimal,
    pub market_value: Decimal,
    pub valued_at: NaiveDate,
}

/// Daily market observation for one instrument. Append-only series keyed
/// (instrument_id, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub instrument_id: InstrumentId,
    pub date: NaiveDate,
    pub price: Decimal,
    pub volatility: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}
