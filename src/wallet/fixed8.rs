//! Fixed-point amounts with 8 decimal places.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{KazeError, KazeResult};

const DECIMALS: usize = 8;
const SCALE: i64 = 100_000_000;

/// A signed amount stored as an integer count of 10^-8 units.
///
/// This is the single canonical representation at every provider boundary.
/// The operators saturate at the `i64` bounds; sums over provider data go
/// through [`Fixed8::checked_sum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed8(i64);

impl Fixed8 {
    pub const ZERO: Fixed8 = Fixed8(0);

    /// Wrap a raw count of 10^-8 units.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Whole units, e.g. `from_units(5)` is 5.00000000.
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(SCALE).map(Self)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Sum of `values`, or `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Fixed8>>(values: I) -> Option<Self> {
        values.into_iter().try_fold(Fixed8::ZERO, Fixed8::checked_add)
    }

    /// [`Fixed8::checked_sum`] reporting overflow as `InvalidAmount`.
    pub fn try_sum<I: IntoIterator<Item = Fixed8>>(values: I, what: &str) -> KazeResult<Self> {
        Self::checked_sum(values).ok_or_else(|| KazeError::InvalidAmount(format!("{} overflows", what)))
    }

    /// Little-endian wire form.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_le_bytes(bytes))
    }
}

impl FromStr for Fixed8 {
    type Err = KazeError;

    /// Exact decimal parse; more than 8 fractional digits is an error.
    fn from_str(s: &str) -> KazeResult<Self> {
        let invalid = || KazeError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if (whole.is_empty() && frac.is_empty())
            || frac.len() > DECIMALS
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole_units: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let frac_units: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };

        let raw = whole_units
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .ok_or_else(invalid)?;
        Ok(Self(if negative { -raw } else { raw }))
    }
}

impl fmt::Display for Fixed8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac = format!("{:0width$}", frac, width = DECIMALS);
            write!(f, "{}{}.{}", sign, whole, frac.trim_end_matches('0'))
        }
    }
}

impl Add for Fixed8 {
    type Output = Fixed8;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fixed8 {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Fixed8 {
    type Output = Fixed8;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fixed8 {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Fixed8 {
    type Output = Fixed8;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Sum for Fixed8 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Fixed8::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Fixed8> for Fixed8 {
    fn sum<I: Iterator<Item = &'a Fixed8>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Fixed8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fixed8 {
    /// Accepts JSON numbers and decimal strings.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(Fixed8Visitor)
    }
}

struct Fixed8Visitor;

impl<'de> Visitor<'de> for Fixed8Visitor {
    type Value = Fixed8;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Fixed8, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Fixed8, E> {
        Fixed8::from_units(v).ok_or_else(|| E::custom(format!("amount {} out of range", v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Fixed8, E> {
        i64::try_from(v)
            .ok()
            .and_then(Fixed8::from_units)
            .ok_or_else(|| E::custom(format!("amount {} out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Fixed8, E> {
        // Shortest round-trip rendering keeps the decimal digits the sender wrote.
        format!("{}", v).parse().map_err(E::custom)
    }
}
