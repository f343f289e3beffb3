//! How many beneficiaries a net amount can fund.

use crate::fees::FeeSchedule;
use crate::money::Money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minimum share a single beneficiary must be able to receive ($0.20).
///
/// Only used to derive capacity; payouts are not rounded to it.
pub const MIN_SHARE: Money = Decimal::from_parts(20, 0, 0, false, 2);

/// Derives beneficiary capacity from a net amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityCalculator {
    min_share: Money,
}

impl CapacityCalculator {
    /// Calculator using a custom minimum share.  Non-positive values fall back
    /// to [`MIN_SHARE`].
    pub fn new(min_share: Money) -> Self {
        let min_share = if min_share > Decimal::ZERO {
            min_share
        } else {
            MIN_SHARE
        };
        Self { min_share }
    }

    /// The minimum share in effect.
    pub fn min_share(&self) -> Money {
        self.min_share
    }

    /// `max(0, floor(net / min_share))`.
    pub fn capacity_for(&self, net: Money) -> u32 {
        if net <= Decimal::ZERO {
            return 0;
        }
        (net / self.min_share)
            .floor()
            .to_u32()
            .unwrap_or(u32::MAX)
    }

    /// Capacity of `gross` once `schedule` has taken its fees.
    pub fn capacity_for_gross(&self, gross: Money, schedule: &dyn FeeSchedule) -> u32 {
        self.capacity_for(schedule.compute_fees(gross).net)
    }
}

impl Default for CapacityCalculator {
    fn default() -> Self {
        Self {
            min_share: MIN_SHARE,
        }
    }
}

/// [`CapacityCalculator::capacity_for`] with the default minimum share.
pub fn capacity_for(net: Money) -> u32 {
    CapacityCalculator::default().capacity_for(net)
}
