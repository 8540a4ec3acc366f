use crate::error::WalletError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A positive monetary amount attached to a single money movement.
///
/// Wraps `rust_decimal::Decimal` so financial arithmetic stays exact and the
/// positivity rule is enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, WalletError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(WalletError::NonPositiveAmount { amount: value })
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Converts to minor currency units (cents) for the gateway boundary.
    ///
    /// The conversion is exact: amounts carrying sub-cent precision are
    /// rejected rather than rounded.
    pub fn to_minor_units(&self) -> Result<i64, WalletError> {
        let minor = self.0 * Decimal::ONE_HUNDRED;
        if !minor.fract().is_zero() {
            return Err(WalletError::InexactMinorUnits { amount: self.0 });
        }
        minor
            .to_i64()
            .ok_or(WalletError::InexactMinorUnits { amount: self.0 })
    }

    pub fn from_minor_units(minor: i64) -> Result<Self, WalletError> {
        Self::new(Decimal::new(minor, 2))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = WalletError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The running balance of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.value()
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.value())
    }
}

impl Add<Amount> for Balance {
    type Output = Self;
    fn add(self, rhs: Amount) -> Self::Output {
        Self(self.0 + rhs.value())
    }
}

impl Sub<Amount> for Balance {
    type Output = Self;
    fn sub(self, rhs: Amount) -> Self::Output {
        Self(self.0 - rhs.value())
    }
}

impl AddAssign<Amount> for Balance {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.value();
    }
}

impl SubAssign<Amount> for Balance {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.value();
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
