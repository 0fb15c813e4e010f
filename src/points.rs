use std::fmt;

use serde::{Deserialize, Serialize};

/// Whole number of economy points.
///
/// Balances are kept as a signed integer so that arithmetic on deltas stays
/// simple; the ledger guarantees stored balances never drop below zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(i64);

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn new(value: i64) -> Self {
        Points(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiply by a whole factor, saturating instead of overflowing.
    pub fn times(self, factor: i64) -> Self {
        Points(self.0.saturating_mul(factor))
    }

    /// Scale by a ratio and truncate toward zero.
    pub fn scale_floor(self, ratio: f64) -> Self {
        Points((self.0 as f64 * ratio).floor() as i64)
    }
}

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Points(value)
    }
}

/// Formats with thousands separators, e.g. `12,345`.
impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped}")
    }
}

impl std::ops::Add for Points {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Points(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Points {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Points(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::AddAssign for Points {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::SubAssign for Points {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl std::iter::Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Points::ZERO, |acc, p| acc + p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Points::new(0).to_string(), "0");
        assert_eq!(Points::new(999).to_string(), "999");
        assert_eq!(Points::new(1_000).to_string(), "1,000");
        assert_eq!(Points::new(1_234_567).to_string(), "1,234,567");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Points::new(-12_500).to_string(), "-12,500");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Points::default(), Points::ZERO);
    }

    #[test]
    fn add_and_sub_assign() {
        let mut p = Points::new(100);
        p += Points::new(50);
        assert_eq!(p, Points::new(150));
        p -= Points::new(30);
        assert_eq!(p, Points::new(120));
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Points::new(i64::MAX) + Points::new(1), Points::new(i64::MAX));
        assert_eq!(Points::new(i64::MAX).times(2), Points::new(i64::MAX));
    }

    #[test]
    fn scale_floor_truncates() {
        assert_eq!(Points::new(1_015).scale_floor(0.8), Points::new(812));
        assert_eq!(Points::new(1_001).scale_floor(0.8), Points::new(800));
    }

    #[test]
    fn sum_of_points() {
        let total: Points = [1, 2, 3].into_iter().map(Points::new).sum();
        assert_eq!(total, Points::new(6));
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Points::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: Points = serde_json::from_str("42").unwrap();
        assert_eq!(back, Points::new(42));
    }
}
