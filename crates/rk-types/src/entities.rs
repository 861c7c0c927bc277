use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a customer across all source feeds.
pub type CustomerId = Uuid;

/// Customer master record.
///
/// Identity fields are immutable; segment and employment status are refreshed
/// on data-refresh cycles. Customers are never hard-deleted; archival sets
/// `archived_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub segment: CustomerSegment,
    /// ISO 3166 alpha-2 country code, used for the macro-indicator join.
    pub country: String,
    pub industry: String,
    pub annual_income: Decimal,
    pub employment_status: EmploymentStatus,
    pub created_at: NaiveDate,
    pub archived_at: Option<NaiveDate>,
}

impl Customer {
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        match self.archived_at {
            Some(archived) => archived > as_of,
            None => true,
        }
    }

    /// Whole years of relationship tenure at the as-of date.
    pub fn tenure_years(&self, as_of: NaiveDate) -> u32 {
        let days = (as_of - self.created_at).num_days().max(0);
        (days / 365) as u32
    }
}

/// Business segment a customer is managed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerSegment {
    Retail,
    Affluent,
    SmallBusiness,
    Corporate,
}

impl fmt::Display for CustomerSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustomerSegment::Retail => "Retail",
            CustomerSegment::Affluent => "Affluent",
            CustomerSegment::SmallBusiness => "SmallBusiness",
            CustomerSegment::Corporate => "Corporate",
        };
        write!(f, "{}", s)
    }
}

/// Employment status as of the latest data refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Retired,
    Unemployed,
}

impl EmploymentStatus {
    /// True when the status implies a recurring income stream.
    pub fn has_stable_income(&self) -> bool {
        matches!(self, EmploymentStatus::Employed | EmploymentStatus::Retired)
    }
}

/// Deposit or investment account. Belongs to exactly one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub product: ProductType,
    pub balance: Decimal,
    pub opened_at: NaiveDate,
}

/// Product types held on deposit accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductType {
    Checking,
    Savings,
    Investment,
}

impl ProductType {
    /// True when balances on this product count toward liquid deposit
    /// coverage in the LGD calculation.
    pub fn is_liquid(&self) -> bool {
        matches!(self, ProductType::Checking | ProductType::Savings)
    }
}

/// Loan facility. Mutated by payment events and nightly aging jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub outstanding_balance: Decimal,
    pub credit_limit: Decimal,
    /// Annual interest rate as a fraction (0.06 = 6%).
    pub interest_rate: Decimal,
    pub days_past_due: u32,
    pub originated_at: NaiveDate,
    pub matures_at: NaiveDate,
}

/// Immutable transaction event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub account_id: Uuid,
    /// Signed amount: positive = credit to the account, negative = debit.
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub merchant_category: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Transaction type as delivered by the posting feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Payment,
    Transfer,
    Fee,
    Overdraft,
}

/// Monthly macro indicators for one country.
///
/// Keyed by (country, month) where `month` is the first day of the month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroIndicator {
    pub country: String,
    pub month: NaiveDate,
    /// Unemployment rate as a fraction (0.05 = 5%).
    pub unemployment_rate: f64,
    /// Year-over-year GDP growth as a fraction.
    pub gdp_growth: f64,
    /// Central-bank policy rate as a fraction.
    pub interest_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn tenure_counts_whole_years() {
        let customer = Customer {
            id: Uuid::new_v4(),
            segment: CustomerSegment::Retail,
            country: "US".into(),
            industry: "services".into(),
            annual_income: dec!(55_000),
            employment_status: EmploymentStatus::Employed,
            created_at: date(2019, 6, 15),
            archived_at: None,
        };
        assert_eq!(customer.tenure_years(date(2024, 6, 14)), 4);
        assert_eq!(customer.tenure_years(date(2024, 6, 16)), 5);
        // As-of before creation never goes negative.
        assert_eq!(customer.tenure_years(date(2018, 1, 1)), 0);
    }

    #[test]
    fn archived_customer_inactive_after_archive_date() {
        let mut customer = Customer {
            id: Uuid::new_v4(),
            segment: CustomerSegment::Corporate,
            country: "DE".into(),
            industry: "manufacturing".into(),
            annual_income: dec!(0),
            employment_status: EmploymentStatus::SelfEmployed,
            created_at: date(2015, 1, 1),
            archived_at: Some(date(2023, 3, 1)),
        };
        assert!(!customer.is_active(date(2023, 6, 1)));
        assert!(customer.is_active(date(2023, 2, 1)));
        customer.archived_at = None;
        assert!(customer.is_active(date(2030, 1, 1)));
    }

    #[test]
    fn liquid_products() {
        assert!(ProductType::Checking.is_liquid());
        assert!(ProductType::Savings.is_liquid());
        assert!(!ProductType::Investment.is_liquid());
    }

    #[test]
    fn stable_income_statuses() {
        assert!(EmploymentStatus::Employed.has_stable_income());
        assert!(EmploymentStatus::Retired.has_stable_income());
        assert!(!EmploymentStatus::Unemployed.has_stable_income());
    }
}
