//! Currency codes and amounts as payment providers expect them.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors produced when parsing a currency or converting an amount.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// The currency code is not one the store can charge in.
    #[error("unsupported currency: {0}")]
    Unsupported(String),
    /// The amount does not fit into the provider's integer minor units.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    /// Payment amounts can never be negative.
    #[error("amount {0} is negative")]
    Negative(Decimal),
}

/// ISO 4217 currencies the store charges in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Uah,
    Usd,
    Eur,
}

impl Currency {
    /// Upper-case ISO code, as LiqPay expects.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Uah => "UAH",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }

    /// Lower-case ISO code, as Stripe expects.
    #[must_use]
    pub const fn stripe_code(self) -> &'static str {
        match self {
            Self::Uah => "uah",
            Self::Usd => "usd",
            Self::Eur => "eur",
        }
    }

    /// Number of minor units per major unit. All supported currencies use 2.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        2
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UAH" => Ok(Self::Uah),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(CurrencyError::Unsupported(other.to_owned())),
        }
    }
}

/// A non-negative amount in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, CurrencyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(CurrencyError::Negative(amount));
        }
        Ok(Self { amount, currency })
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Amount rounded to the currency's precision, half away from zero.
    #[must_use]
    pub fn rounded(&self) -> Decimal {
        self.amount.round_dp_with_strategy(
            self.currency.exponent(),
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Amount in integer minor units (kopiykas, cents).
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::OutOfRange`] if the value does not fit `i64`.
    pub fn minor_units(&self) -> Result<i64, CurrencyError> {
        let scale = Decimal::from(10_i64.pow(self.currency.exponent()));
        let minor = self.rounded() * scale;
        i64::try_from(minor.trunc()).map_err(|_| CurrencyError::OutOfRange(self.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.rounded(), self.currency)
    }
}
