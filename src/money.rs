//! Integer-cent money type.
//!
//! All monetary arithmetic in the engine happens in whole cents (`i64`) so
//! that allocation sums, balance identities, and interest accrual never
//! accumulate floating-point drift. Entity columns store raw cents; this
//! type wraps them for arithmetic, comparison, and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A monetary amount in whole cents.
///
/// `Money` is `Copy` and totally ordered, so it can be summed, sorted, and
/// compared directly. Negative amounts are outflows or debts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw cent count.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Builds an amount from whole dollars.
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// The raw cent count.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// The smaller of two amounts.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// The larger of two amounts.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Clamps negative amounts to zero.
    #[must_use]
    pub fn max_zero(self) -> Self {
        Self(self.0.max(0))
    }

    /// Multiplies by a fractional rate, rounding half away from zero to the
    /// nearest cent. Used for interest accrual (`balance × apr/12`).
    ///
    /// # Errors
    /// Returns [`Error::InvalidAmount`](crate::errors::Error::InvalidAmount)
    /// if the rate is not finite.
    pub fn mul_rate(self, rate: f64) -> crate::errors::Result<Self> {
        if !rate.is_finite() {
            return Err(crate::errors::Error::InvalidAmount { amount: rate });
        }
        // Cents values in this domain are far below 2^52, so the f64
        // round-trip is exact for the integral part.
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let cents = (self.0 as f64 * rate).round() as i64;
        Ok(Self(cents))
    }

    /// Parses a decimal dollar string into cents.
    ///
    /// Accepts `"10.50"`, `"-10.50"`, `"$10.50"`, and whole-dollar `"10"`.
    /// At most two fraction digits are allowed; this is seed-config input,
    /// not a general decimal parser.
    ///
    /// # Errors
    /// Returns [`Error::Config`](crate::errors::Error::Config) on any
    /// malformed input.
    pub fn parse(input: &str) -> crate::errors::Result<Self> {
        let bad = || crate::errors::Error::Config {
            message: format!("invalid money amount: {input:?}"),
        };

        let s = input.trim();
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let s = s.strip_prefix('$').unwrap_or(s);
        if s.is_empty() {
            return Err(bad());
        }

        let cents = match s.split_once('.') {
            Some((dollars, frac)) => {
                if frac.is_empty() || frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(bad());
                }
                let dollars: i64 = dollars.parse().map_err(|_| bad())?;
                let mut frac_cents: i64 = frac.parse().map_err(|_| bad())?;
                if frac.len() == 1 {
                    frac_cents *= 10;
                }
                dollars * 100 + frac_cents
            }
            None => s.parse::<i64>().map_err(|_| bad())? * 100,
        };

        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
