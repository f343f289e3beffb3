//! Guards every amount or selection change against beneficiary capacity.
//!
//! Validation never mutates.  [`AllocationValidator::apply`] mutates only after
//! an accept, so a rejection leaves the set exactly as it was.

use crate::allocation::{AllocationError, AllocationSet, BeneficiaryKind, BeneficiaryRef};
use crate::capacity::CapacityCalculator;
use crate::collective::CollectiveCache;
use crate::fees::FeeSchedule;
use crate::money::{format_dollars, Money};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// How selected beneficiaries are counted against capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    /// Every top-level entry is one slot; a collective counts once.
    #[default]
    Slots,
    /// An expanded collective counts once per member cause.
    ExpandedCauses,
}

/// A requested change to the editing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOp {
    /// Move the gross amount to `to`.
    ChangeAmount {
        /// Proposed gross amount.
        to: Money,
    },
    /// Select another beneficiary.
    Add(BeneficiaryRef),
    /// Deselect a beneficiary.
    Remove {
        /// Id to drop.
        id: String,
        /// Kind to drop.
        kind: BeneficiaryKind,
    },
}

fn dollars(amount: &Money) -> String {
    format_dollars(*amount)
}

/// Why an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Lowering the amount would leave more beneficiaries than it can fund.
    #[error("remove {excess} beneficiaries to lower the amount to {}", dollars(.amount))]
    LowerAmountExceedsCapacity {
        /// Beneficiaries that must go first.
        excess: u32,
        /// Capacity at the proposed amount.
        capacity: u32,
        /// Proposed gross amount.
        amount: Money,
    },
    /// A whole proposed selection does not fit the amount it is submitted with.
    #[error("remove {excess} beneficiaries to fit {}", dollars(.amount))]
    SelectionExceedsCapacity {
        /// Beneficiaries over capacity.
        excess: u32,
        /// Capacity at `amount`.
        capacity: u32,
        /// Submitted gross amount.
        amount: Money,
    },
    /// The current amount cannot fund another beneficiary.
    #[error("increase your donation to support more causes")]
    AddExceedsCapacity {
        /// Capacity at the current amount.
        capacity: u32,
    },
    /// Checkout or save with nothing selected.
    #[error("choose at least one cause or collective")]
    EmptyAllocation,
    /// The set itself refused the change.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl Rejection {
    /// Whether this is a capacity rejection rather than a set invariant.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            Self::LowerAmountExceedsCapacity { .. }
                | Self::SelectionExceedsCapacity { .. }
                | Self::AddExceedsCapacity { .. }
        )
    }
}

/// Outcome of validating an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The operation may proceed.
    Accept,
    /// The operation was refused; nothing changed.
    Reject(Rejection),
}

impl Decision {
    /// Whether the decision is an accept.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Converts into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Self::Accept => Ok(()),
            Self::Reject(rejection) => Err(rejection),
        }
    }
}

impl From<Result<(), Rejection>> for Decision {
    fn from(result: Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => Self::Accept,
            Err(rejection) => Self::Reject(rejection),
        }
    }
}

/// Capacity rules for amount and selection changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationValidator {
    capacity: CapacityCalculator,
    mode: CapacityMode,
}

impl AllocationValidator {
    /// Validator with a specific calculator and counting mode.
    pub fn new(capacity: CapacityCalculator, mode: CapacityMode) -> Self {
        Self { capacity, mode }
    }

    /// The capacity calculator in use.
    pub fn capacity(&self) -> &CapacityCalculator {
        &self.capacity
    }

    /// The counting mode in use.
    pub fn mode(&self) -> CapacityMode {
        self.mode
    }

    /// Slots `set` currently occupies.
    pub fn occupied(&self, set: &AllocationSet, expansions: &CollectiveCache) -> u32 {
        match self.mode {
            CapacityMode::Slots => set.count(),
            CapacityMode::ExpandedCauses => expansions.expanded_count(set),
        }
    }

    fn weight(&self, beneficiary: &BeneficiaryRef, expansions: &CollectiveCache) -> u32 {
        match (self.mode, beneficiary.kind) {
            (CapacityMode::ExpandedCauses, BeneficiaryKind::Collective) => {
                expansions.weight_of(&beneficiary.id)
            }
            _ => 1,
        }
    }

    /// Decides whether `op` may be applied.
    ///
    /// `gross` is the amount currently in effect; for
    /// [`AllocationOp::ChangeAmount`] the proposed amount travels in the op.
    pub fn validate(
        &self,
        op: &AllocationOp,
        set: &AllocationSet,
        gross: Money,
        schedule: &dyn FeeSchedule,
        expansions: &CollectiveCache,
    ) -> Decision {
        let decision = match op {
            AllocationOp::ChangeAmount { to } => {
                if *to >= gross {
                    Decision::Accept
                } else {
                    self.overflow(set, *to, schedule, expansions)
                        .map_or(Decision::Accept, |(excess, capacity)| {
                            Decision::Reject(Rejection::LowerAmountExceedsCapacity {
                                excess,
                                capacity,
                                amount: *to,
                            })
                        })
                }
            }
            AllocationOp::Add(beneficiary) => {
                if set.contains(&beneficiary.id, beneficiary.kind) {
                    Decision::Reject(Rejection::Allocation(
                        AllocationError::DuplicateBeneficiary {
                            id: beneficiary.id.clone(),
                            kind: beneficiary.kind,
                        },
                    ))
                } else {
                    let capacity = self.capacity.capacity_for_gross(gross, schedule);
                    let needed = self
                        .occupied(set, expansions)
                        .saturating_add(self.weight(beneficiary, expansions));
                    if needed > capacity {
                        Decision::Reject(Rejection::AddExceedsCapacity { capacity })
                    } else {
                        Decision::Accept
                    }
                }
            }
            AllocationOp::Remove { id, kind } => {
                if set.contains(id, *kind) {
                    Decision::Accept
                } else {
                    Decision::Reject(Rejection::Allocation(AllocationError::NotFound {
                        id: id.clone(),
                        kind: *kind,
                    }))
                }
            }
        };
        debug!(
            ?op,
            schedule = schedule.name(),
            accepted = decision.is_accept(),
            "allocation op validated"
        );
        decision
    }

    /// Validates `op` and, on accept, applies it to `set` and `gross`.
    pub fn apply(
        &self,
        op: AllocationOp,
        set: &mut AllocationSet,
        gross: &mut Money,
        schedule: &dyn FeeSchedule,
        expansions: &CollectiveCache,
    ) -> Decision {
        let decision = self.validate(&op, set, *gross, schedule, expansions);
        if !decision.is_accept() {
            return decision;
        }
        let applied = match op {
            AllocationOp::ChangeAmount { to } => {
                *gross = to;
                Ok(())
            }
            AllocationOp::Add(beneficiary) => set.add(beneficiary),
            AllocationOp::Remove { id, kind } => set.remove(&id, kind).map(|_| ()),
        };
        match applied {
            Ok(()) => Decision::Accept,
            Err(err) => Decision::Reject(err.into()),
        }
    }

    /// Re-checks a whole proposed `(set, gross)` pair, as submitted by a box update.
    pub fn validate_replacement(
        &self,
        set: &AllocationSet,
        gross: Money,
        schedule: &dyn FeeSchedule,
        expansions: &CollectiveCache,
    ) -> Decision {
        match self.overflow(set, gross, schedule, expansions) {
            Some((excess, capacity)) => Decision::Reject(Rejection::SelectionExceedsCapacity {
                excess,
                capacity,
                amount: gross,
            }),
            None => Decision::Accept,
        }
    }

    /// `(excess, capacity)` when `set` occupies more slots than `gross` funds.
    fn overflow(
        &self,
        set: &AllocationSet,
        gross: Money,
        schedule: &dyn FeeSchedule,
        expansions: &CollectiveCache,
    ) -> Option<(u32, u32)> {
        let capacity = self.capacity.capacity_for_gross(gross, schedule);
        let occupied = self.occupied(set, expansions);
        (occupied > capacity).then(|| (occupied - capacity, capacity))
    }
}
