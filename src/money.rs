//! Decimal money helpers and the donor-entered gross amount.
//!
//! Amounts are kept at full decimal precision while they flow through the
//! engine.  Rounding to cents happens where a fee is produced and when a value
//! is shown to the donor, always half-up.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary value in dollars.
pub type Money = Decimal;

/// Smallest gross amount accepted by both the recurring and one-time flows.
pub const MIN_GROSS: Money = Decimal::from_parts(5, 0, 0, false, 0);

/// Increment applied by the +/- amount controls.
pub const AMOUNT_STEP: Money = Decimal::from_parts(5, 0, 0, false, 0);

/// Rounds `value` to cents, half-up.
pub fn round_cents(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats a value as dollars with exactly two decimals.
pub fn format_dollars(value: Money) -> String {
    format!("${:.2}", round_cents(value))
}

/// Gross donation amount as entered by the donor, before fees.
///
/// The value is always at least the configured minimum and carries at most
/// two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrossAmount(Money);

impl GrossAmount {
    /// Smallest accepted gross amount.
    pub fn minimum() -> Self {
        Self(MIN_GROSS)
    }

    /// Interprets a directly typed amount, clamping it up to `MIN_GROSS`.
    pub fn typed(value: Money) -> Self {
        Self::typed_with_minimum(value, MIN_GROSS)
    }

    /// Same as [`GrossAmount::typed`] with a caller-supplied minimum.
    pub fn typed_with_minimum(value: Money, minimum: Money) -> Self {
        Self(round_cents(value.max(minimum)))
    }

    /// Returns the underlying dollar value.
    pub fn value(self) -> Money {
        self.0
    }

    /// The next amount up by `step`.
    pub fn stepped_up(self, step: Money) -> Self {
        Self(self.0 + step)
    }

    /// The next amount down by `step`, never below `minimum`.
    pub fn stepped_down(self, step: Money, minimum: Money) -> Self {
        Self((self.0 - step).max(minimum))
    }
}

impl Default for GrossAmount {
    fn default() -> Self {
        Self::minimum()
    }
}

impl fmt::Display for GrossAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_dollars(self.0))
    }
}

impl From<GrossAmount> for Money {
    fn from(amount: GrossAmount) -> Self {
        amount.0
    }
}

/// Serde adapter writing money as a two-decimal string (`"25.00"`).
pub mod cents {
    use super::{round_cents, Money};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes `value` rounded and rescaled to two decimals.
    pub fn serialize<S: Serializer>(value: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rounded = round_cents(*value);
        rounded.rescale(2);
        serializer.serialize_str(&rounded.to_string())
    }

    /// Accepts either a decimal string or a JSON number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        <Money as Deserialize>::deserialize(deserializer)
    }

    /// Same encoding for optional fields.
    pub mod option {
        use super::Money;
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes `Some` as a two-decimal string and `None` as null.
        pub fn serialize<S: Serializer>(
            value: &Option<Money>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Reads an optional decimal string or number.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Money>, D::Error> {
            Option::<Money>::deserialize(deserializer)
        }
    }
}
