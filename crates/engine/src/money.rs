use std::{fmt, ops::Neg};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{Currency, EngineError, ResultEngine};

/// Exact monetary amount in a given currency.
///
/// Amounts are `rust_decimal::Decimal`, so conversions and deductions never
/// go through floating point. Values in different currencies can only be
/// combined after an explicit [`Money::convert`] with a [`Rate`].
///
/// The value is signed, following the ledger convention:
/// - positive = expense / outflow
/// - negative = income / refund
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
///
/// let spent = Money::from_minor(10_000, Currency::USD);
/// let refund = Money::from_minor(-2_550, Currency::USD);
/// assert_eq!(spent.checked_add(refund).unwrap().to_string(), "74.50 USD");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Builds money from a stored minor-unit amount (e.g. cents).
    #[must_use]
    pub fn from_minor(minor: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor, currency.minor_units()), currency)
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.amount.abs(), self.currency)
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(self, rhs: Money) -> ResultEngine<Money> {
        self.ensure_same_currency(rhs)?;
        self.amount
            .checked_add(rhs.amount)
            .map(|amount| Self::new(amount, self.currency))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Subtracts an amount of the same currency.
    pub fn checked_sub(self, rhs: Money) -> ResultEngine<Money> {
        self.checked_add(-rhs)
    }

    /// Converts into `rate.to()`; the rate must start from this currency.
    pub fn convert(self, rate: &Rate) -> ResultEngine<Money> {
        if rate.from != self.currency {
            return Err(EngineError::CurrencyMismatch(format!(
                "rate converts from {}, got {}",
                rate.from, self.currency
            )));
        }
        self.amount
            .checked_mul(rate.value)
            .map(|amount| Self::new(amount, rate.to))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    fn ensure_same_currency(&self, other: Money) -> ResultEngine<()> {
        if self.currency != other.currency {
            return Err(EngineError::CurrencyMismatch(format!(
                "cannot combine {} with {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Self::new(-self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.currency.minor_units().max(self.amount.scale());
        let mut amount = self.amount;
        amount.rescale(scale);
        write!(f, "{amount} {}", self.currency)
    }
}

/// Where a conversion rate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateSource {
    /// A stored `exchange_rates` row.
    Stored,
    /// Source and target currency are the same and no row exists.
    Identity,
    /// No row for a cross-currency conversion; the value defaults to 1.
    Missing,
}

/// Multiplicative conversion rate for a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
    from: Currency,
    to: Currency,
    date: NaiveDate,
    value: Decimal,
    source: RateSource,
}

impl Rate {
    #[must_use]
    pub const fn stored(date: NaiveDate, from: Currency, to: Currency, value: Decimal) -> Self {
        Self {
            from,
            to,
            date,
            value,
            source: RateSource::Stored,
        }
    }

    /// 1:1 fallback used when no stored rate exists.
    #[must_use]
    pub fn fallback(date: NaiveDate, from: Currency, to: Currency) -> Self {
        let source = if from == to {
            RateSource::Identity
        } else {
            RateSource::Missing
        };
        Self {
            from,
            to,
            date,
            value: Decimal::ONE,
            source,
        }
    }

    #[must_use]
    pub const fn from(&self) -> Currency {
        self.from
    }

    #[must_use]
    pub const fn to(&self) -> Currency {
        self.to
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.value
    }

    #[must_use]
    pub const fn source(&self) -> RateSource {
        self.source
    }

    /// `true` when the rate is a default standing in for a missing row.
    #[must_use]
    pub fn is_configuration_gap(&self) -> bool {
        self.source == RateSource::Missing
    }
}
