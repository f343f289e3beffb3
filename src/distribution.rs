//! Equal split of the net amount across selected beneficiaries.

use crate::money::{round_cents, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What each beneficiary receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    /// Net divided by beneficiary count, unrounded.
    pub per_beneficiary: Money,
    /// `floor(100 / count)`.  Shares may sum to less than 100.
    pub percentage: u32,
}

impl Share {
    /// Per-beneficiary amount rounded half-up to cents for display.
    pub fn per_beneficiary_display(&self) -> Money {
        round_cents(self.per_beneficiary)
    }
}

/// Computes equal shares.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionCalculator;

impl DistributionCalculator {
    /// Share of `net` for each of `count` beneficiaries.
    pub fn share_for(&self, net: Money, count: u32) -> Share {
        if count == 0 {
            return Share {
                per_beneficiary: Decimal::ZERO,
                percentage: 0,
            };
        }
        Share {
            per_beneficiary: net / Decimal::from(count),
            percentage: 100 / count,
        }
    }
}
