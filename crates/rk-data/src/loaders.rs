//! CSV feed loaders.
//!
//! Upstream producers deliver flat tabular feeds (one CSV per table, headers
//! matching the field names). Loading is strict: a malformed row fails the
//! load with its file and line, and referential integrity is enforced when
//! the snapshot is built.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

use rk_types::{
    Account, Customer, DataError, Instrument, Loan, MacroIndicator, MarketDataPoint,
    PortfolioPosition, RkResult, Transaction,
};

use crate::snapshot::{SnapshotBuilder, SourceSnapshot};

const CUSTOMERS_FEED: &str = "customers.csv";
const ACCOUNTS_FEED: &str = "accounts.csv";
const LOANS_FEED: &str = "loans.csv";
const TRANSACTIONS_FEED: &str = "transactions.csv";
const INSTRUMENTS_FEED: &str = "instruments.csv";
const POSITIONS_FEED: &str = "positions.csv";
const MARKET_DATA_FEED: &str = "market_data.csv";
const MACRO_FEED: &str = "macro_indicators.csv";

/// Load every feed present under `dir` into a validated snapshot.
///
/// Missing feed files are treated as empty tables, so credit-only and
/// market-only deployments can share one loader.
pub fn load_snapshot<P: AsRef<Path>>(dir: P, as_of: NaiveDate) -> RkResult<SourceSnapshot> {
    let dir = dir.as_ref();
    let mut builder = SnapshotBuilder::new(as_of);

    for customer in read_feed::<Customer>(&dir.join(CUSTOMERS_FEED))? {
        builder = builder.customer(customer);
    }
    for account in read_feed::<Account>(&dir.join(ACCOUNTS_FEED))? {
        builder = builder.account(account);
    }
    for loan in read_feed::<Loan>(&dir.join(LOANS_FEED))? {
        builder = builder.loan(loan);
    }
    for txn in read_feed::<Transaction>(&dir.join(TRANSACTIONS_FEED))? {
        builder = builder.transaction(txn);
    }
    for instrument in read_feed::<Instrument>(&dir.join(INSTRUMENTS_FEED))? {
        builder = builder.instrument(instrument);
    }
    for position in read_feed::<PortfolioPosition>(&dir.join(POSITIONS_FEED))? {
        builder = builder.position(position);
    }
    for point in read_feed::<MarketDataPoint>(&dir.join(MARKET_DATA_FEED))? {
        builder = builder.market_data_point(point);
    }
    for indicator in read_feed::<MacroIndicator>(&dir.join(MACRO_FEED))? {
        builder = builder.macro_indicator(indicator);
    }

    let snapshot = builder.build()?;
    info!(
        customers = snapshot.customer_ids().len(),
        portfolios = snapshot.portfolio_ids().len(),
        %as_of,
        "source snapshot loaded"
    );
    Ok(snapshot)
}

fn read_feed<T: DeserializeOwned>(path: &Path) -> RkResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| DataError::InvalidFormat {
        message: format!("{}: {}", path.display(), e),
    })?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize().enumerate() {
        // +2: one for the header row, one for 1-based line numbers.
        let row: T = result.map_err(|e| DataError::ParseError {
            message: format!("{} line {}: {}", path.display(), index + 2, e),
        })?;
        rows.push(row);
    }
    Ok(rows)
}
