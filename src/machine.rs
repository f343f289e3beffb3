//! Lifecycle of a recurring donation box.
//!
//! ```text
//! Draft --create--> PendingActivation --activate--> Active --pause/cancel--> Cancelled
//!                                                    |  ^
//!                                                    +--+ update
//! ```
//!
//! Every transition that reaches the collaborator leaves the box in its
//! previous state when the call fails.  Nothing is retried automatically.

use crate::allocation::{AllocationSet, BeneficiaryKind, BeneficiaryRef};
use crate::collaborator::{
    CollaboratorError, CreateDonationBox, DonationBoxRecord, DonationCollaborator,
    UpdateDonationBox,
};
use crate::collective::{CollectiveCache, ExpansionPending};
use crate::fees::FeeSchedule;
use crate::money::GrossAmount;
use crate::session::{summarize, AllocationSummary, EditingSession};
use crate::validator::{AllocationValidator, CapacityMode, Rejection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Where a donation box is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationBoxStatus {
    /// Configured locally, not yet persisted.
    Draft,
    /// Persisted, waiting for activation.
    PendingActivation,
    /// Charging monthly.
    Active,
    /// Reported by the backend only; the client never pauses on its own.
    Paused,
    /// Stopped for good; giving again means creating a new box.
    Cancelled,
}

impl fmt::Display for DonationBoxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::PendingActivation => "pending activation",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Transition names used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxAction {
    /// Persist a draft.
    Create,
    /// Start billing.
    Activate,
    /// Acknowledge a completed checkout redirect.
    ConfirmCheckout,
    /// Replace amount and beneficiaries.
    Update,
    /// Pause (treated as cancel).
    Pause,
    /// Cancel.
    Cancel,
}

impl fmt::Display for BoxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Activate => "activate",
            Self::ConfirmCheckout => "confirm checkout for",
            Self::Update => "update",
            Self::Pause => "pause",
            Self::Cancel => "cancel",
        };
        f.write_str(label)
    }
}

/// Why a transition did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The action is not allowed from the current status.
    #[error("cannot {action} a donation box that is {from}")]
    InvalidTransition {
        /// Status at the time of the call.
        from: DonationBoxStatus,
        /// Requested action.
        action: BoxAction,
    },
    /// Local validation refused the change.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    /// A collective was not expanded before building the payload.
    #[error(transparent)]
    ExpansionPending(#[from] ExpansionPending),
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Billing started with nothing further to do.
    Active,
    /// The donor must complete checkout at this URL.
    CheckoutRequired(String),
}

/// Client-side copy of a donation box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationBox {
    /// Backend id, absent until created.
    pub id: Option<String>,
    /// Monthly gross amount.
    pub gross_amount: GrossAmount,
    /// Selected beneficiaries.
    pub allocation: AllocationSet,
    /// Lifecycle status.
    pub status: DonationBoxStatus,
    /// Next scheduled charge.
    pub next_charge_date: Option<NaiveDate>,
}

impl DonationBox {
    /// An empty draft.
    pub fn draft() -> Self {
        Self {
            id: None,
            gross_amount: GrossAmount::minimum(),
            allocation: AllocationSet::new(),
            status: DonationBoxStatus::Draft,
            next_charge_date: None,
        }
    }

    fn absorb(&mut self, record: DonationBoxRecord) {
        self.id = Some(record.id);
        self.next_charge_date = record.next_charge_date.or(self.next_charge_date);
    }
}

/// Drives one donation box through its lifecycle.
pub struct DonationBoxMachine {
    donation_box: DonationBox,
    collaborator: Arc<dyn DonationCollaborator>,
    schedule: Arc<dyn FeeSchedule>,
    validator: AllocationValidator,
    expansions: CollectiveCache,
    pending_checkout: Option<String>,
    unsaved_changes: bool,
}

impl DonationBoxMachine {
    /// A machine holding a fresh draft.
    ///
    /// `schedule` is the fee schedule used for capacity checks on this box.
    pub fn new(
        collaborator: Arc<dyn DonationCollaborator>,
        schedule: Arc<dyn FeeSchedule>,
        validator: AllocationValidator,
    ) -> Self {
        Self::resume(DonationBox::draft(), collaborator, schedule, validator)
    }

    /// A machine for a box restored from elsewhere.
    pub fn resume(
        donation_box: DonationBox,
        collaborator: Arc<dyn DonationCollaborator>,
        schedule: Arc<dyn FeeSchedule>,
        validator: AllocationValidator,
    ) -> Self {
        Self {
            donation_box,
            collaborator,
            schedule,
            validator,
            expansions: CollectiveCache::new(),
            pending_checkout: None,
            unsaved_changes: false,
        }
    }

    /// The box as the client currently sees it.
    pub fn donation_box(&self) -> &DonationBox {
        &self.donation_box
    }

    /// Current status.
    pub fn status(&self) -> DonationBoxStatus {
        self.donation_box.status
    }

    /// Checkout URL the donor still has to visit, if any.
    pub fn awaiting_checkout(&self) -> Option<&str> {
        self.pending_checkout.as_deref()
    }

    /// Active with no checkout redirect outstanding.
    pub fn is_effectively_active(&self) -> bool {
        self.donation_box.status == DonationBoxStatus::Active && self.pending_checkout.is_none()
    }

    /// Whether local removals have not been sent yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Projection of the box under `schedule`.
    pub fn summary(&self, schedule: &dyn FeeSchedule) -> AllocationSummary {
        summarize(
            self.donation_box.gross_amount.value(),
            &self.donation_box.allocation,
            &self.expansions,
            &self.validator,
            schedule,
        )
    }

    fn require(&self, expected: DonationBoxStatus, action: BoxAction) -> Result<(), TransitionError> {
        if self.donation_box.status == expected {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                from: self.donation_box.status,
                action,
            })
        }
    }

    /// Persists the draft with `amount` and `set`.
    ///
    /// Collectives in `set` are expanded through `expansions` so the payload
    /// lists member causes.  On success the box is `PendingActivation`.
    pub async fn create(
        &mut self,
        amount: GrossAmount,
        set: &AllocationSet,
        expansions: &mut CollectiveCache,
    ) -> Result<&DonationBox, TransitionError> {
        self.require(DonationBoxStatus::Draft, BoxAction::Create)?;
        if set.is_empty() {
            return Err(Rejection::EmptyAllocation.into());
        }
        expansions
            .expand_all(set, self.collaborator.as_ref())
            .await?;
        self.validator
            .validate_replacement(set, amount.value(), self.schedule.as_ref(), expansions)
            .into_result()?;
        let causes = expansions.beneficiary_payload(set)?;
        if causes.is_empty() {
            return Err(Rejection::EmptyAllocation.into());
        }
        let request = CreateDonationBox {
            monthly_amount: amount.value(),
            causes,
        };
        let record = self
            .collaborator
            .create_donation_box(&request)
            .await
            .map_err(|err| {
                warn!(error = %err, "donation box create failed");
                err
            })?;
        info!(box_id = %record.id, amount = %amount, causes = request.causes.len(), "donation box created");
        self.donation_box.absorb(record);
        self.donation_box.gross_amount = amount;
        self.donation_box.allocation = set.clone();
        self.donation_box.status = DonationBoxStatus::PendingActivation;
        self.expansions = expansions.clone();
        self.unsaved_changes = false;
        Ok(&self.donation_box)
    }

    /// [`DonationBoxMachine::create`] straight from an editing session.
    pub async fn create_from_session(
        &mut self,
        session: &mut EditingSession,
    ) -> Result<&DonationBox, TransitionError> {
        let (amount, set, expansions) = session.parts_mut();
        self.create(amount, set, expansions).await
    }

    /// Starts billing.
    pub async fn activate(&mut self) -> Result<ActivationOutcome, TransitionError> {
        self.require(DonationBoxStatus::PendingActivation, BoxAction::Activate)?;
        let activation = self
            .collaborator
            .activate_donation_box()
            .await
            .map_err(|err| {
                warn!(error = %err, "donation box activation failed");
                err
            })?;
        self.donation_box.status = DonationBoxStatus::Active;
        info!(box_id = ?self.donation_box.id, redirect = activation.checkout_url.is_some(), "donation box activated");
        match activation.checkout_url {
            Some(url) => {
                self.pending_checkout = Some(url.clone());
                Ok(ActivationOutcome::CheckoutRequired(url))
            }
            None => Ok(ActivationOutcome::Active),
        }
    }

    /// Records that the donor came back from the checkout redirect.
    pub fn confirm_checkout(&mut self) -> Result<(), TransitionError> {
        self.require(DonationBoxStatus::Active, BoxAction::ConfirmCheckout)?;
        self.pending_checkout = None;
        Ok(())
    }

    /// Beneficiaries after dropping `removed` from and appending `added` to the
    /// box's current selection.  Already selected additions are skipped.
    pub fn combined_allocation(
        &self,
        removed: &[(&str, BeneficiaryKind)],
        added: &[BeneficiaryRef],
    ) -> AllocationSet {
        self.donation_box
            .allocation
            .iter()
            .filter(|entry| !removed.iter().any(|(id, kind)| entry.matches(id, *kind)))
            .chain(added.iter())
            .cloned()
            .collect()
    }

    /// Replaces amount and beneficiaries after re-checking capacity for the
    /// whole proposed selection.
    pub async fn update(
        &mut self,
        amount: GrossAmount,
        set: AllocationSet,
    ) -> Result<&DonationBox, TransitionError> {
        self.require(DonationBoxStatus::Active, BoxAction::Update)?;
        if set.is_empty() {
            return Err(Rejection::EmptyAllocation.into());
        }
        if self.validator.mode() == CapacityMode::ExpandedCauses {
            self.expansions
                .expand_all(&set, self.collaborator.as_ref())
                .await?;
        }
        self.validator
            .validate_replacement(&set, amount.value(), self.schedule.as_ref(), &self.expansions)
            .into_result()?;
        let update = UpdateDonationBox {
            monthly_amount: Some(amount.value()),
            cause_ids: Some(set.cause_ids()),
            collective_ids: Some(set.collective_ids()),
        };
        let record = self
            .collaborator
            .update_donation_box(&update)
            .await
            .map_err(|err| {
                warn!(error = %err, "donation box update failed");
                err
            })?;
        info!(box_id = %record.id, amount = %amount, count = set.count(), "donation box updated");
        self.donation_box.absorb(record);
        self.donation_box.gross_amount = amount;
        self.donation_box.allocation = set;
        self.unsaved_changes = false;
        Ok(&self.donation_box)
    }

    /// Sends the current amount and selection, flushing local removals.
    pub async fn save_changes(&mut self) -> Result<&DonationBox, TransitionError> {
        let amount = self.donation_box.gross_amount;
        let set = self.donation_box.allocation.clone();
        self.update(amount, set).await
    }

    /// Pausing is not a separate persisted state; the box is cancelled.
    pub async fn pause(&mut self) -> Result<(), TransitionError> {
        self.stop(BoxAction::Pause).await
    }

    /// Cancels the box.  Terminal.
    pub async fn cancel(&mut self) -> Result<(), TransitionError> {
        self.stop(BoxAction::Cancel).await
    }

    async fn stop(&mut self, action: BoxAction) -> Result<(), TransitionError> {
        self.require(DonationBoxStatus::Active, action)?;
        self.collaborator
            .cancel_donation_box()
            .await
            .map_err(|err| {
                warn!(error = %err, %action, "donation box cancel failed");
                err
            })?;
        info!(box_id = ?self.donation_box.id, %action, "donation box cancelled");
        self.donation_box.status = DonationBoxStatus::Cancelled;
        self.pending_checkout = None;
        Ok(())
    }

    /// Drops a beneficiary locally.  On an active box it is sent with the next update.
    pub fn remove(&mut self, id: &str, kind: BeneficiaryKind) -> Result<BeneficiaryRef, TransitionError> {
        let removed = self
            .donation_box
            .allocation
            .remove(id, kind)
            .map_err(Rejection::from)?;
        if self.donation_box.id.is_some() && self.donation_box.status == DonationBoxStatus::Active {
            self.unsaved_changes = true;
        }
        Ok(removed)
    }
}
