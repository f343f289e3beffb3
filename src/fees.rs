//! Fee schedules mapping a gross donation to processor/platform fees.
//!
//! Two schedules exist and they disagree for the same donation: the blended
//! card-processor-plus-platform schedule shown on review and checkout
//! summaries, and the tiered platform-only schedule used while a box is set up
//! and when amount changes are validated.  Callers always pick one by name.

use crate::money::{round_cents, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fees deducted from a gross amount, in cents precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    /// Card processor fee.
    pub processor_fee: Money,
    /// Platform fee.
    pub platform_fee: Money,
    /// Amount left for beneficiaries.  May be negative for tiny gross values.
    pub net: Money,
}

impl FeeBreakdown {
    fn from_fees(gross: Money, processor_fee: Money, platform_fee: Money) -> Self {
        Self {
            processor_fee,
            platform_fee,
            net: gross - processor_fee - platform_fee,
        }
    }

    /// Sum of both fees.
    pub fn total_fees(&self) -> Money {
        self.processor_fee + self.platform_fee
    }
}

/// Pure mapping from a gross amount to its fee breakdown.
pub trait FeeSchedule: Send + Sync {
    /// Computes the fees for `gross`.
    fn compute_fees(&self, gross: Money) -> FeeBreakdown;

    /// Label used in logs and CLI output.
    fn name(&self) -> &'static str;
}

/// Card processor percentage plus fixed fee, then a platform cut of the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedSchedule {
    /// Processor percentage as a fraction (0.029).
    pub processor_rate: Money,
    /// Processor fixed fee per charge (0.30).
    pub processor_fixed: Money,
    /// Platform share of the post-processor amount (0.07).
    pub platform_rate: Money,
}

impl Default for BlendedSchedule {
    fn default() -> Self {
        Self {
            processor_rate: Decimal::new(29, 3),
            processor_fixed: Decimal::new(30, 2),
            platform_rate: Decimal::new(7, 2),
        }
    }
}

impl FeeSchedule for BlendedSchedule {
    fn compute_fees(&self, gross: Money) -> FeeBreakdown {
        let processor_fee = round_cents(gross * self.processor_rate + self.processor_fixed);
        let platform_fee = round_cents((gross - processor_fee) * self.platform_rate);
        FeeBreakdown::from_fees(gross, processor_fee, platform_fee)
    }

    fn name(&self) -> &'static str {
        "blended"
    }
}

/// Flat platform fee below a threshold, percentage platform fee above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredSchedule {
    /// Gross amounts strictly below this pay the flat fee (10.00).
    pub threshold: Money,
    /// Flat platform fee under the threshold (1.00).
    pub flat_fee: Money,
    /// Platform percentage at or above the threshold (0.10).
    pub platform_rate: Money,
}

impl Default for TieredSchedule {
    fn default() -> Self {
        Self {
            threshold: Decimal::TEN,
            flat_fee: Decimal::ONE,
            platform_rate: Decimal::new(10, 2),
        }
    }
}

impl FeeSchedule for TieredSchedule {
    fn compute_fees(&self, gross: Money) -> FeeBreakdown {
        let platform_fee = if gross < self.threshold {
            self.flat_fee
        } else {
            round_cents(gross * self.platform_rate)
        };
        FeeBreakdown::from_fees(gross, Decimal::ZERO, platform_fee)
    }

    fn name(&self) -> &'static str {
        "tiered"
    }
}

/// Named selector for the built-in schedules, used by configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeScheduleKind {
    /// [`BlendedSchedule`] with default rates.
    Blended,
    /// [`TieredSchedule`] with default tiers.
    Tiered,
}

impl FeeScheduleKind {
    /// Builds the schedule this kind names.
    pub fn schedule(self) -> Box<dyn FeeSchedule> {
        match self {
            Self::Blended => Box::new(BlendedSchedule::default()),
            Self::Tiered => Box::new(TieredSchedule::default()),
        }
    }
}

impl fmt::Display for FeeScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blended => f.write_str("blended"),
            Self::Tiered => f.write_str("tiered"),
        }
    }
}

impl FromStr for FeeScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blended" => Ok(Self::Blended),
            "tiered" => Ok(Self::Tiered),
            other => Err(format!("unknown fee schedule: {other}")),
        }
    }
}
