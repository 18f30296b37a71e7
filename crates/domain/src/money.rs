//! Monetary amounts in major currency units.

use serde::{Deserialize, Serialize};

/// A monetary amount held in major currency units.
///
/// The platform stores and compares amounts in major units everywhere;
/// the payment provider expects minor units (1/100th), so conversion
/// happens through [`Money::minor_units`] at the gateway boundary and
/// nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    major: i64,
}

impl Money {
    /// Creates an amount from major currency units.
    pub fn from_major(major: i64) -> Self {
        Self { major }
    }

    /// Creates an amount from minor currency units, truncating toward zero.
    pub fn from_minor(minor: i64) -> Self {
        Self { major: minor / 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { major: 0 }
    }

    /// Returns the amount in major units.
    pub fn major_units(&self) -> i64 {
        self.major
    }

    /// Returns the amount in minor units (major * 100).
    ///
    /// Gateway implementations call this immediately before a provider
    /// request; minor-unit values must not be stored or compared anywhere
    /// else.
    pub fn minor_units(&self) -> i64 {
        self.major * 100
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.major > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.major == 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.major)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            major: self.major + rhs.major,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            major: self.major - rhs.major,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major() {
        let money = Money::from_major(1500);
        assert_eq!(money.major_units(), 1500);
        assert_eq!(money.minor_units(), 150_000);
    }

    #[test]
    fn test_from_minor_truncates() {
        assert_eq!(Money::from_minor(150_000).major_units(), 1500);
        assert_eq!(Money::from_minor(150_050).major_units(), 1500);
    }

    #[test]
    fn test_predicates() {
        assert!(Money::from_major(10).is_positive());
        assert!(Money::zero().is_zero());
        assert!(!Money::from_major(-5).is_positive());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(1000);
        let b = Money::from_major(250);
        assert_eq!((a + b).major_units(), 1250);
        assert_eq!((a - b).major_units(), 750);
    }

    #[test]
    fn test_serialization_is_transparent() {
        let money = Money::from_major(1500);
        let json = serde_json::to_string(&money).unwrap();
        assert_eq!(json, "1500");
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, deserialized);
    }
}
