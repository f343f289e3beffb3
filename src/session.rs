//! In-progress editing state and its read-only projection.
//!
//! An [`EditingSession`] owns the gross amount, the selection and the
//! collective expansions for one donor while they edit.  Every mutation is
//! routed through the [`AllocationValidator`] with the fee schedule the caller
//! names.  The view layer reads an [`AllocationSummary`] and never touches the
//! state directly.

use crate::allocation::{AllocationSet, BeneficiaryKind, BeneficiaryRef};
use crate::collective::CollectiveCache;
use crate::config::EngineConfig;
use crate::distribution::{DistributionCalculator, Share};
use crate::fees::{FeeBreakdown, FeeSchedule};
use crate::money::{cents, GrossAmount, Money, AMOUNT_STEP, MIN_GROSS};
use crate::validator::{AllocationOp, AllocationValidator, Decision};
use rust_decimal::Decimal;
use serde::Serialize;

/// Donor-facing numbers derived from the current editing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    /// Schedule the numbers were computed with.
    pub schedule: &'static str,
    /// Gross amount.
    #[serde(with = "cents")]
    pub gross: Money,
    /// Fee breakdown for `gross`.
    pub fees: FeeBreakdown,
    /// Beneficiaries the net amount can fund.
    pub capacity: u32,
    /// Slots currently occupied.
    pub count: u32,
    /// Slots still free.
    pub remaining_slots: u32,
    /// Equal share per beneficiary.
    pub share: Share,
}

/// Ephemeral state of a donor configuring a box or a gift.
#[derive(Debug, Clone)]
pub struct EditingSession {
    gross: GrossAmount,
    set: AllocationSet,
    expansions: CollectiveCache,
    validator: AllocationValidator,
    min_gross: Money,
    step: Money,
}

impl EditingSession {
    /// Session starting at the minimum amount with nothing selected.
    pub fn new(validator: AllocationValidator) -> Self {
        Self {
            gross: GrossAmount::minimum(),
            set: AllocationSet::new(),
            expansions: CollectiveCache::new(),
            validator,
            min_gross: MIN_GROSS,
            step: AMOUNT_STEP,
        }
    }

    /// Session using the limits and validator described by `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            gross: GrossAmount::typed_with_minimum(config.min_gross, config.min_gross),
            min_gross: config.min_gross,
            step: config.amount_step,
            ..Self::new(config.validator())
        }
    }

    /// Current gross amount.
    pub fn gross(&self) -> GrossAmount {
        self.gross
    }

    /// Current selection.
    pub fn allocation(&self) -> &AllocationSet {
        &self.set
    }

    /// Collective expansions gathered so far.
    pub fn expansions(&self) -> &CollectiveCache {
        &self.expansions
    }

    /// Mutable access for expanding collectives against a collaborator.
    pub fn expansions_mut(&mut self) -> &mut CollectiveCache {
        &mut self.expansions
    }

    /// Validator in use.
    pub fn validator(&self) -> &AllocationValidator {
        &self.validator
    }

    /// Raises the amount by one step.
    pub fn increase_amount(&mut self, schedule: &dyn FeeSchedule) -> Decision {
        let to = self.gross.stepped_up(self.step);
        self.change_amount(to, schedule)
    }

    /// Lowers the amount by one step, never below the minimum.
    pub fn decrease_amount(&mut self, schedule: &dyn FeeSchedule) -> Decision {
        let to = self.gross.stepped_down(self.step, self.min_gross);
        self.change_amount(to, schedule)
    }

    /// Applies a directly typed amount, clamped to the minimum.
    pub fn set_amount(&mut self, typed: Money, schedule: &dyn FeeSchedule) -> Decision {
        let to = GrossAmount::typed_with_minimum(typed, self.min_gross);
        self.change_amount(to, schedule)
    }

    fn change_amount(&mut self, to: GrossAmount, schedule: &dyn FeeSchedule) -> Decision {
        let mut gross = self.gross.value();
        let decision = self.validator.apply(
            AllocationOp::ChangeAmount { to: to.value() },
            &mut self.set,
            &mut gross,
            schedule,
            &self.expansions,
        );
        if decision.is_accept() {
            self.gross = to;
        }
        decision
    }

    /// Selects `beneficiary` if capacity allows.
    pub fn add(&mut self, beneficiary: BeneficiaryRef, schedule: &dyn FeeSchedule) -> Decision {
        self.apply(AllocationOp::Add(beneficiary), schedule)
    }

    /// Deselects `(id, kind)`.
    pub fn remove(&mut self, id: &str, kind: BeneficiaryKind, schedule: &dyn FeeSchedule) -> Decision {
        self.apply(
            AllocationOp::Remove {
                id: id.to_string(),
                kind,
            },
            schedule,
        )
    }

    /// Deselects `beneficiary` when selected, selects it otherwise.
    pub fn toggle(&mut self, beneficiary: BeneficiaryRef, schedule: &dyn FeeSchedule) -> Decision {
        if self.set.contains(&beneficiary.id, beneficiary.kind) {
            self.remove(&beneficiary.id, beneficiary.kind, schedule)
        } else {
            self.add(beneficiary, schedule)
        }
    }

    fn apply(&mut self, op: AllocationOp, schedule: &dyn FeeSchedule) -> Decision {
        let mut gross = self.gross.value();
        self.validator
            .apply(op, &mut self.set, &mut gross, schedule, &self.expansions)
    }

    /// Projection of the current state under `schedule`.
    pub fn summary(&self, schedule: &dyn FeeSchedule) -> AllocationSummary {
        summarize(
            self.gross.value(),
            &self.set,
            &self.expansions,
            &self.validator,
            schedule,
        )
    }

    /// Empties the selection and returns to the minimum amount.
    pub fn discard(&mut self) {
        self.set.clear();
        self.gross = GrossAmount::typed_with_minimum(self.min_gross, self.min_gross);
    }

    /// Amount, selection and mutable expansions at once, for box creation.
    pub fn parts_mut(&mut self) -> (GrossAmount, &AllocationSet, &mut CollectiveCache) {
        (self.gross, &self.set, &mut self.expansions)
    }

    /// Hands the edited state over, e.g. to a donation box.
    pub fn into_parts(self) -> (GrossAmount, AllocationSet, CollectiveCache) {
        (self.gross, self.set, self.expansions)
    }
}

/// Projection for any `(gross, set)` pair, used by sessions and saved boxes.
pub fn summarize(
    gross: Money,
    set: &AllocationSet,
    expansions: &CollectiveCache,
    validator: &AllocationValidator,
    schedule: &dyn FeeSchedule,
) -> AllocationSummary {
    let fees = schedule.compute_fees(gross);
    let capacity = validator.capacity().capacity_for(fees.net);
    let count = validator.occupied(set, expansions);
    AllocationSummary {
        schedule: schedule.name(),
        gross,
        fees,
        capacity,
        count,
        remaining_slots: capacity.saturating_sub(count),
        share: DistributionCalculator.share_for(fees.net.max(Decimal::ZERO), count),
    }
}
