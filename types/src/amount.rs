//! Signed fixed-point monetary amounts.
//!
//! Amounts are represented as raw integer units (i64) to avoid floating-point errors.
//! One whole unit is `SCALE` raw units, so every decimal with up to eight
//! fractional digits has an exact representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use crate::TallyError;

/// A signed amount. Positive = incoming, negative = outgoing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Raw units per whole unit.
    pub const SCALE: i64 = 100_000_000;

    const FRACTION_DIGITS: usize = 8;

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Whole units, e.g. `Amount::from_units(3)` is `3`.
    ///
    /// # Panics
    ///
    /// Panics if `units` does not fit in the raw representation. Use
    /// [`Amount::checked_from_units`] for untrusted input.
    pub fn from_units(units: i64) -> Self {
        match Self::checked_from_units(units) {
            Some(amount) => amount,
            None => panic!("{units} whole units overflow Amount"),
        }
    }

    /// Whole units, or `None` when they do not fit.
    pub fn checked_from_units(units: i64) -> Option<Self> {
        units.checked_mul(Self::SCALE).map(Self)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Exact sum, or `None` as soon as a partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

/// Saturating. Ledgers that overflow never get past [`crate::Wallet::add`],
/// so a wallet balance is always exact.
impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Amount {
    type Err = TallyError;

    /// Parse a decimal such as `"9.99"`, `"-14.95"` or `"+3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TallyError::InvalidAmount(s.to_string());
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty()
            || !all_digits(whole)
            || !all_digits(fraction)
            || fraction.len() > Self::FRACTION_DIGITS
            || (digits.contains('.') && fraction.is_empty())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| TallyError::AmountOverflow)?;
        let fraction: i64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = Self::FRACTION_DIGITS);
            padded.parse().map_err(|_| invalid())?
        };
        let raw = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(fraction))
            .ok_or(TallyError::AmountOverflow)?;
        Ok(Self(if negative { -raw } else { raw }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let whole = abs / scale;
        let fraction = abs % scale;
        if fraction == 0 {
            return write!(f, "{sign}{whole}");
        }
        let fraction = format!("{fraction:0width$}", width = Self::FRACTION_DIGITS);
        write!(f, "{sign}{whole}.{}", fraction.trim_end_matches('0'))
    }
}
