//! Immutable as-of snapshot of the source tables.
//!
//! Each scoring or measurement cycle operates on one [`SourceSnapshot`] taken
//! at a cutoff date. The snapshot is read-only and shared across workers, so
//! no locking is needed once built.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::HashMap;

use rk_types::{
    Account, Customer, CustomerId, DataError, Instrument, InstrumentId, Loan, MacroIndicator,
    MarketDataPoint, PortfolioId, PortfolioPosition, RkResult, Transaction,
};

/// Read-only view over all source tables as of a cutoff date.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    as_of: NaiveDate,
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<CustomerId, Vec<Account>>,
    loans: HashMap<CustomerId, Vec<Loan>>,
    /// Sorted by timestamp ascending.
    transactions: HashMap<CustomerId, Vec<Transaction>>,
    instruments: HashMap<InstrumentId, Instrument>,
    positions: HashMap<PortfolioId, Vec<PortfolioPosition>>,
    /// Sorted by date ascending.
    market_data: HashMap<InstrumentId, Vec<MarketDataPoint>>,
    macro_indicators: HashMap<(String, NaiveDate), MacroIndicator>,
}

impl SourceSnapshot {
    pub fn builder(as_of: NaiveDate) -> SnapshotBuilder {
        SnapshotBuilder::new(as_of)
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn customer(&self, id: CustomerId) -> RkResult<&Customer> {
        self.customers.get(&id).ok_or_else(|| {
            DataError::CustomerNotFound {
                customer_id: id.to_string(),
            }
            .into()
        })
    }

    /// Customer ids in sorted order, so batch partitioning is deterministic.
    pub fn customer_ids(&self) -> Vec<CustomerId> {
        let mut ids: Vec<CustomerId> = self.customers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The scoring population: customers not archived at the as-of date, in
    /// sorted order. Archived customers keep their stored history but are
    /// never rescored.
    pub fn active_customer_ids(&self) -> Vec<CustomerId> {
        let mut ids: Vec<CustomerId> = self
            .customers
            .values()
            .filter(|c| c.is_active(self.as_of))
            .map(|c| c.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn accounts_for(&self, customer_id: CustomerId) -> &[Account] {
        self.accounts
            .get(&customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn loans_for(&self, customer_id: CustomerId) -> &[Loan] {
        self.loans
            .get(&customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Transactions for a customer within `[from, to]`, oldest first.
    pub fn transactions_for(
        &self,
        customer_id: CustomerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&Transaction> {
        self.transactions
            .get(&customer_id)
            .map(|txns| {
                txns.iter()
                    .filter(|t| t.timestamp >= from && t.timestamp <= to)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Portfolio ids in sorted order.
    pub fn portfolio_ids(&self) -> Vec<PortfolioId> {
        let mut ids: Vec<PortfolioId> = self.positions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn positions_for(&self, portfolio_id: PortfolioId) -> &[PortfolioPosition] {
        self.positions
            .get(&portfolio_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn instrument(&self, id: InstrumentId) -> RkResult<&Instrument> {
        self.instruments.get(&id).ok_or_else(|| {
            DataError::InstrumentNotFound {
                instrument_id: id.to_string(),
            }
            .into()
        })
    }

    /// Market observations for an instrument within `[from, to]`, oldest
    /// first.
    pub fn market_series(
        &self,
        instrument_id: InstrumentId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<&MarketDataPoint> {
        self.market_data
            .get(&instrument_id)
            .map(|series| {
                series
                    .iter()
                    .filter(|p| p.date >= from && p.date <= to)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Macro indicators for a country at the month containing `date`.
    ///
    /// The feed is monthly and can lag; falls back to the previous month
    /// before reporting the data missing.
    pub fn macro_for(&self, country: &str, date: NaiveDate) -> Option<&MacroIndicator> {
        let month = first_of_month(date);
        self.macro_indicators
            .get(&(country.to_string(), month))
            .or_else(|| {
                let previous = previous_month(month);
                self.macro_indicators.get(&(country.to_string(), previous))
            })
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn previous_month(month_start: NaiveDate) -> NaiveDate {
    let (year, month) = if month_start.month() == 1 {
        (month_start.year() - 1, 12)
    } else {
        (month_start.year(), month_start.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(month_start)
}

/// Builder that collects feed rows and validates referential integrity on
/// build: every row must reference an entity that exists in the snapshot.
#[derive(Debug)]
pub struct SnapshotBuilder {
    as_of: NaiveDate,
    customers: HashMap<CustomerId, Customer>,
    accounts: Vec<Account>,
    loans: Vec<Loan>,
    transactions: Vec<Transaction>,
    instruments: HashMap<InstrumentId, Instrument>,
    positions: Vec<PortfolioPosition>,
    market_data: Vec<MarketDataPoint>,
    macro_indicators: Vec<MacroIndicator>,
}

impl SnapshotBuilder {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            customers: HashMap::new(),
            accounts: Vec::new(),
            loans: Vec::new(),
            transactions: Vec::new(),
            instruments: HashMap::new(),
            positions: Vec::new(),
            market_data: Vec::new(),
            macro_indicators: Vec::new(),
        }
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customers.insert(customer.id, customer);
        self
    }

    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn loan(mut self, loan: Loan) -> Self {
        self.loans.push(loan);
        self
    }

    pub fn transaction(mut self, txn: Transaction) -> Self {
        self.transactions.push(txn);
        self
    }

    pub fn instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.insert(instrument.id, instrument);
        self
    }

    pub fn position(mut self, position: PortfolioPosition) -> Self {
        self.positions.push(position);
        self
    }

    pub fn market_data_point(mut self, point: MarketDataPoint) -> Self {
        self.market_data.push(point);
        self
    }

    pub fn macro_indicator(mut self, indicator: MacroIndicator) -> Self {
        self.macro_indicators.push(indicator);
        self
    }

    pub fn build(self) -> RkResult<SourceSnapshot> {
        let mut accounts: HashMap<CustomerId, Vec<Account>> = HashMap::new();
        for account in self.accounts {
            if !self.customers.contains_key(&account.customer_id) {
                return Err(orphan("account", account.id, "customer", account.customer_id));
            }
            accounts.entry(account.customer_id).or_default().push(account);
        }

        let mut loans: HashMap<CustomerId, Vec<Loan>> = HashMap::new();
        for loan in self.loans {
            if !self.customers.contains_key(&loan.customer_id) {
                return Err(orphan("loan", loan.id, "customer", loan.customer_id));
            }
            loans.entry(loan.customer_id).or_default().push(loan);
        }

        let mut transactions: HashMap<CustomerId, Vec<Transaction>> = HashMap::new();
        for txn in self.transactions {
            if !self.customers.contains_key(&txn.customer_id) {
                return Err(orphan("transaction", txn.id, "customer", txn.customer_id));
            }
            transactions.entry(txn.customer_id).or_default().push(txn);
        }
        for txns in transactions.values_mut() {
            txns.sort_by_key(|t| t.timestamp);
        }

        let mut positions: HashMap<PortfolioId, Vec<PortfolioPosition>> = HashMap::new();
        for position in self.positions {
            if !self.instruments.contains_key(&position.instrument_id) {
                return Err(orphan(
                    "position",
                    position.portfolio_id,
                    "instrument",
                    position.instrument_id,
                ));
            }
            positions
                .entry(position.portfolio_id)
                .or_default()
                .push(position);
        }

        let mut market_data: HashMap<InstrumentId, Vec<MarketDataPoint>> = HashMap::new();
        for point in self.market_data {
            if !self.instruments.contains_key(&point.instrument_id) {
                return Err(orphan(
                    "market data point",
                    point.instrument_id,
                    "instrument",
                    point.instrument_id,
                ));
            }
            market_data.entry(point.instrument_id).or_default().push(point);
        }
        for series in market_data.values_mut() {
            series.sort_by_key(|p| p.date);
        }

        let macro_indicators = self
            .macro_indicators
            .into_iter()
            .map(|m| ((m.country.clone(), first_of_month(m.month)), m))
            .collect();

        Ok(SourceSnapshot {
            as_of: self.as_of,
            customers: self.customers,
            accounts,
            loans,
            transactions,
            instruments: self.instruments,
            positions,
            market_data,
            macro_indicators,
        })
    }
}

fn orphan(
    row_kind: &str,
    row_id: uuid::Uuid,
    target_kind: &str,
    target_id: uuid::Uuid,
) -> rk_types::RiskError {
    DataError::OrphanReference {
        message: format!("{row_kind} {row_id} references missing {target_kind} {target_id}"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_types::{CustomerSegment, EmploymentStatus, ProductType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(id: CustomerId) -> Customer {
        Customer {
            id,
            segment: CustomerSegment::Retail,
            country: "US".into(),
            industry: "services".into(),
            annual_income: dec!(60_000),
            employment_status: EmploymentStatus::Employed,
            created_at: date(2020, 1, 1),
            archived_at: None,
        }
    }

    #[test]
    fn orphan_account_rejected() {
        let result = SourceSnapshot::builder(date(2024, 6, 30))
            .account(Account {
                id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                product: ProductType::Checking,
                balance: dec!(100),
                opened_at: date(2022, 1, 1),
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn customer_ids_sorted() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(a))
            .customer(customer(b))
            .build()
            .unwrap();
        let ids = snapshot.customer_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn archived_customers_leave_the_scoring_population() {
        let active = Uuid::new_v4();
        let archived = Uuid::new_v4();
        let mut gone = customer(archived);
        gone.archived_at = Some(date(2024, 3, 1));

        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(customer(active))
            .customer(gone)
            .build()
            .unwrap();

        assert_eq!(snapshot.customer_ids().len(), 2);
        assert_eq!(snapshot.active_customer_ids(), vec![active]);
    }

    #[test]
    fn archival_after_the_cutoff_keeps_the_customer_active() {
        let id = Uuid::new_v4();
        let mut c = customer(id);
        c.archived_at = Some(date(2024, 9, 1));
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .customer(c)
            .build()
            .unwrap();
        assert_eq!(snapshot.active_customer_ids(), vec![id]);
    }

    #[test]
    fn macro_lookup_falls_back_one_month() {
        let snapshot = SourceSnapshot::builder(date(2024, 6, 30))
            .macro_indicator(MacroIndicator {
                country: "US".into(),
                month: date(2024, 5, 1),
                unemployment_rate: 0.05,
                gdp_growth: 0.02,
                interest_rate: 0.0425,
            })
            .build()
            .unwrap();

        // June has no observation yet; May is served instead.
        let indicator = snapshot.macro_for("US", date(2024, 6, 15)).unwrap();
        assert_eq!(indicator.month, date(2024, 5, 1));
        // Two months stale is treated as missing.
        assert!(snapshot.macro_for("US", date(2024, 8, 15)).is_none());
        assert!(snapshot.macro_for("DE", date(2024, 5, 15)).is_none());
    }

    #[test]
    fn january_fallback_crosses_year_boundary() {
        let snapshot = SourceSnapshot::builder(date(2024, 1, 31))
            .macro_indicator(MacroIndicator {
                country: "US".into(),
                month: date(2023, 12, 1),
                unemployment_rate: 0.04,
                gdp_growth: 0.025,
                interest_rate: 0.045,
            })
            .build()
            .unwrap();
        assert!(snapshot.macro_for("US", date(2024, 1, 15)).is_some());
    }
}
