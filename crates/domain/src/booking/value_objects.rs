//! Value objects for the booking domain.

use chrono::NaiveDate;
use common::{CenterId, TechnicianId, TechnicianSlotId};
use serde::{Deserialize, Serialize};

/// Money amount in đồng. The currency has no minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount.
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw amount.
    pub fn amount(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Subtracts `other`, flooring at zero.
    pub fn saturating_discount(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{grouped}đ")
        } else {
            write!(f, "{grouped}đ")
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

/// Address of one unit of technician capacity.
///
/// Two holds conflict exactly when their keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    pub center_id: CenterId,
    pub technician_id: TechnicianId,
    pub date: NaiveDate,
    pub technician_slot_id: TechnicianSlotId,
}

impl SlotKey {
    pub fn new(
        center_id: CenterId,
        technician_id: TechnicianId,
        date: NaiveDate,
        technician_slot_id: TechnicianSlotId,
    ) -> Self {
        Self {
            center_id,
            technician_id,
            date,
            technician_slot_id,
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "center {} / technician {} / {} / slot {}",
            self.center_id, self.technician_id, self.date, self.technician_slot_id
        )
    }
}

/// A license plate in canonical form.
///
/// Surrounding and internal whitespace is dropped and letters are uppercased;
/// dashes and dots are kept, so `"51a-123.45"` and `" 51A-123.45"` are the
/// same plate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Normalizes a raw plate. Returns `None` if nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();
        (!normalized.is_empty()).then_some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against an unnormalized plate.
    pub fn matches(&self, raw: &str) -> bool {
        LicensePlate::parse(raw).is_some_and(|other| other == *self)
    }
}

impl std::fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LicensePlate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
