//! Money amounts in minor units (kobo).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency symbol used when rendering amounts.
pub const CURRENCY_SYMBOL: &str = "₦";

/// Errors produced when normalizing a display-formatted price.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    /// The input had no digits at all.
    #[error("price is empty: {0:?}")]
    Empty(String),

    /// The input is not a recognizable price.
    #[error("invalid price: {0:?}")]
    Invalid(String),

    /// The amount does not fit in the minor-unit range.
    #[error("price out of range: {0:?}")]
    Overflow(String),
}

/// Money amount represented in minor units to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in minor units (e.g., 150000 = ₦1,500.00)
    minor: i64,
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub const fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    /// Creates a new Money amount from a whole-currency value, saturating at
    /// the bounds of the minor-unit range.
    pub fn from_major(major: i64) -> Self {
        Self {
            minor: major.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { minor: 0 }
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns the whole-currency portion.
    pub fn major(&self) -> i64 {
        self.minor / 100
    }

    /// Returns the minor-unit remainder after the whole portion.
    pub fn minor_part(&self) -> i64 {
        self.minor.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Multiplies by a quantity, saturating on overflow.
    ///
    /// Use [`Money::checked_multiply`] where an out-of-range total must be
    /// rejected rather than clamped.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            minor: self.minor.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity. Returns `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.minor
            .checked_mul(i64::from(quantity))
            .map(Money::from_minor)
    }

    /// Adds two amounts. Returns `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.minor.checked_add(rhs.minor).map(Money::from_minor)
    }

    /// Sums amounts, returning `None` if any partial sum overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Parses a display-formatted price such as `"₦1,250.50"` or `"2500"`.
    ///
    /// A leading currency symbol or code is ignored, thousands separators must
    /// group by three, and the fraction may have one or two digits.
    pub fn parse_display(input: &str) -> Result<Money, MoneyParseError> {
        let trimmed = input.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };

        let digits_start = rest
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| MoneyParseError::Empty(input.to_string()))?;
        let (prefix, number) = rest.split_at(digits_start);
        if prefix.chars().any(|c| matches!(c, '.' | ',' | '-' | '+')) {
            return Err(MoneyParseError::Invalid(input.to_string()));
        }

        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (number, None),
        };

        if !valid_grouping(whole) {
            return Err(MoneyParseError::Invalid(input.to_string()));
        }
        let whole: i64 = whole
            .replace(',', "")
            .parse()
            .map_err(|_| MoneyParseError::Overflow(input.to_string()))?;

        let fraction = match fraction {
            None => 0,
            Some(f) if (1..=2).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit()) => {
                let value: i64 = f
                    .parse()
                    .map_err(|_| MoneyParseError::Invalid(input.to_string()))?;
                if f.len() == 1 { value * 10 } else { value }
            }
            Some(_) => return Err(MoneyParseError::Invalid(input.to_string())),
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|m| m.checked_add(fraction))
            .ok_or_else(|| MoneyParseError::Overflow(input.to_string()))?;

        Ok(Money::from_minor(if negative { -minor } else { minor }))
    }
}

fn valid_grouping(whole: &str) -> bool {
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit() || b == b',') {
        return false;
    }
    if !whole.contains(',') {
        return true;
    }
    let mut groups = whole.split(',');
    let first_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()));
    first_ok && groups.all(|g| g.len() == 3)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let major = self.minor.unsigned_abs() / 100;
        write!(
            f,
            "{sign}{CURRENCY_SYMBOL}{}.{:02}",
            group_thousands(major),
            self.minor_part()
        )
    }
}

// Operators saturate; totals that must stay exact go through the checked
// methods.
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            minor: self.minor.saturating_add(rhs.minor),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            minor: self.minor.saturating_sub(rhs.minor),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
