//! Data-quality flags carried on every derived record.
//!
//! Downstream consumers filter on flags instead of discovering silent
//! corruption; every soft-fail path in the engine raises exactly one flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single data-quality condition observed while deriving a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataQualityFlag {
    /// No macro indicators for the customer's country at the as-of month;
    /// the neutral multiplier was substituted.
    MacroDataMissing,
    /// A ratio had a zero or near-zero denominator and was defined as zero.
    UndefinedRatio,
    /// VaR/ES computed on fewer than the configured minimum observations.
    LowConfidence,
    /// Historical VaR exceeds parametric VaR by more than the configured
    /// ratio, a fat-tail divergence warning.
    TailDivergence,
    /// A derived field violated its documented range; the record is fatal
    /// and excluded from aggregates.
    InvalidRange,
}

impl fmt::Display for DataQualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataQualityFlag::MacroDataMissing => "MACRO_DATA_MISSING",
            DataQualityFlag::UndefinedRatio => "UNDEFINED_RATIO",
            DataQualityFlag::LowConfidence => "LOW_CONFIDENCE",
            DataQualityFlag::TailDivergence => "TAIL_DIVERGENCE",
            DataQualityFlag::InvalidRange => "INVALID_RANGE",
        };
        write!(f, "{}", s)
    }
}

/// Ordered set of quality flags.
///
/// A `BTreeSet` so identical inputs always serialize identically; the
/// reporting aggregator's idempotence depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlags(BTreeSet<DataQualityFlag>);

impl QualityFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, flag: DataQualityFlag) {
        self.0.insert(flag);
    }

    pub fn contains(&self, flag: DataQualityFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the record must be excluded from aggregate totals.
    pub fn is_fatal(&self) -> bool {
        self.0.contains(&DataQualityFlag::InvalidRange)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataQualityFlag> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_is_idempotent() {
        let mut flags = QualityFlags::new();
        flags.raise(DataQualityFlag::UndefinedRatio);
        flags.raise(DataQualityFlag::UndefinedRatio);
        assert_eq!(flags.iter().count(), 1);
        assert!(flags.contains(DataQualityFlag::UndefinedRatio));
    }

    #[test]
    fn only_invalid_range_is_fatal() {
        let mut flags = QualityFlags::new();
        flags.raise(DataQualityFlag::LowConfidence);
        flags.raise(DataQualityFlag::MacroDataMissing);
        assert!(!flags.is_fatal());
        flags.raise(DataQualityFlag::InvalidRange);
        assert!(flags.is_fatal());
    }

    #[test]
    fn serialization_is_order_independent() {
        let mut a = QualityFlags::new();
        a.raise(DataQualityFlag::TailDivergence);
        a.raise(DataQualityFlag::LowConfidence);

        let mut b = QualityFlags::new();
        b.raise(DataQualityFlag::LowConfidence);
        b.raise(DataQualityFlag::TailDivergence);

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn screaming_snake_wire_format() {
        let mut flags = QualityFlags::new();
        flags.raise(DataQualityFlag::MacroDataMissing);
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["MACRO_DATA_MISSING"]"#);
    }
}
