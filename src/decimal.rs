use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// currency places used for EMI amounts and report totals
pub const CURRENCY_DP: u32 = 2;

/// exact money amount, never rounded implicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d)
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s.trim())?))
    }

    /// create from whole currency units (rupees, dollars)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor units (paise, cents)
    pub fn from_minor(amount: i64) -> Self {
        Money::from_decimal(Decimal::new(amount, CURRENCY_DP))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// half-up rounding to `dp` places
    pub fn round_half_up(&self, dp: u32) -> Self {
        Money(self.0.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `rate` percent of this amount
    pub fn percentage(&self, rate: Rate) -> Option<Self> {
        self.0
            .checked_mul(rate.as_percentage())
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(Money::from_decimal)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

/// interest rate stored as a percentage (10 means 10%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from percentage (e.g., 12.5 for 12.5%)
    pub fn from_percentage_decimal(p: Decimal) -> Self {
        Rate(p)
    }

    /// create from whole percentage (e.g., 10 for 10%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p))
    }

    /// create from a fraction (e.g., 0.1 for 10%); `None` if the percentage overflows
    pub fn from_fraction(d: Decimal) -> Option<Self> {
        d.checked_mul(Decimal::ONE_HUNDRED).map(Rate)
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// loosely-typed amount as it arrives from a caller: an exact decimal, a float, or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoneyInput {
    Exact(Decimal),
    Float(f64),
    Text(String),
}

impl MoneyInput {
    /// coerce into a decimal; `None` when the input is not a finite number
    pub fn coerce(&self) -> Option<Decimal> {
        match self {
            MoneyInput::Exact(d) => Some(*d),
            MoneyInput::Float(f) if f.is_finite() => Decimal::from_f64(*f),
            MoneyInput::Float(_) => None,
            MoneyInput::Text(s) => {
                let trimmed = s.trim();
                Decimal::from_str(trimmed)
                    .or_else(|_| Decimal::from_scientific(trimmed))
                    .ok()
            }
        }
    }
}

impl From<Money> for MoneyInput {
    fn from(m: Money) -> Self {
        MoneyInput::Exact(m.as_decimal())
    }
}

impl From<Decimal> for MoneyInput {
    fn from(d: Decimal) -> Self {
        MoneyInput::Exact(d)
    }
}

impl From<f64> for MoneyInput {
    fn from(f: f64) -> Self {
        MoneyInput::Float(f)
    }
}

impl From<i64> for MoneyInput {
    fn from(i: i64) -> Self {
        MoneyInput::Exact(Decimal::from(i))
    }
}

impl From<&str> for MoneyInput {
    fn from(s: &str) -> Self {
        MoneyInput::Text(s.to_string())
    }
}

impl From<String> for MoneyInput {
    fn from(s: String) -> Self {
        MoneyInput::Text(s)
    }
}

/// running result of chained decimal arithmetic.
///
/// Once an operand fails to coerce or an operation overflows the tally is invalid and
/// stays invalid, the decimal analogue of NaN propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally(Option<Decimal>);

impl Tally {
    pub const ZERO: Tally = Tally(Some(Decimal::ZERO));

    pub fn of(value: impl Into<MoneyInput>) -> Self {
        Tally(value.into().coerce())
    }

    pub fn add(self, value: impl Into<MoneyInput>) -> Self {
        let rhs = value.into().coerce();
        Tally(self.0.zip(rhs).and_then(|(a, b)| a.checked_add(b)))
    }

    pub fn subtract(self, value: impl Into<MoneyInput>) -> Self {
        let rhs = value.into().coerce();
        Tally(self.0.zip(rhs).and_then(|(a, b)| a.checked_sub(b)))
    }

    pub fn is_invalid(&self) -> bool {
        self.0.is_none()
    }

    /// convert back to money at the storage boundary
    pub fn to_money(self) -> Option<Money> {
        self.0.map(Money::from_decimal)
    }
}

impl From<Money> for Tally {
    fn from(m: Money) -> Self {
        Tally(Some(m.as_decimal()))
    }
}

/// exact `a + b`
pub fn add(a: impl Into<MoneyInput>, b: impl Into<MoneyInput>) -> Tally {
    Tally::of(a).add(b)
}

/// exact `a - b`
pub fn subtract(a: impl Into<MoneyInput>, b: impl Into<MoneyInput>) -> Tally {
    Tally::of(a).subtract(b)
}

pub fn is_invalid(t: &Tally) -> bool {
    t.is_invalid()
}
