#![deny(missing_docs)]

//! # givebox
//!
//! Allocation engine for recurring "donation boxes" and one-time gifts.
//!
//! A donor picks a monthly (or one-off) gross amount and a set of causes and
//! collectives.  The engine works out the fees under a named schedule, how
//! many beneficiaries the net amount can fund at the minimum share, and
//! whether each edit keeps the selection within that capacity.  Remote effects
//! (persisting a box, activation, checkout, collective lookups) go through the
//! [`DonationCollaborator`] trait so the rules stay testable offline.
//!
//! ## Features
//!
//! * **Fees**: [`BlendedSchedule`] (processor then platform fee) and
//!   [`TieredSchedule`] (flat fee below a threshold), both behind
//!   [`FeeSchedule`].
//! * **Capacity**: [`CapacityCalculator`] turns a net amount into a whole
//!   number of beneficiary slots.
//! * **Validation**: [`AllocationValidator`] accepts or rejects amount
//!   changes, additions and removals with donor-facing reasons.
//! * **Lifecycle**: [`DonationBoxMachine`] drives a box from draft to
//!   cancellation; [`OneTimeGift`] opens a single checkout.
//! * **HTTP** (feature `http`): a `reqwest` collaborator.
//!
//! ## Usage
//!
//! ```rust
//! use givebox::{AllocationValidator, BeneficiaryRef, EditingSession, TieredSchedule};
//! use rust_decimal::Decimal;
//!
//! let schedule = TieredSchedule::default();
//! let mut session = EditingSession::new(AllocationValidator::default());
//! assert!(session.set_amount(Decimal::from(25), &schedule).is_accept());
//! assert!(session.add(BeneficiaryRef::cause("food-bank"), &schedule).is_accept());
//!
//! let summary = session.summary(&schedule);
//! assert_eq!(summary.capacity, 112);
//! assert_eq!(summary.count, 1);
//! ```

pub mod allocation;
pub mod capacity;
pub mod collaborator;
pub mod collective;
pub mod config;
pub mod distribution;
pub mod fees;
#[cfg(feature = "http")]
pub mod http;
pub mod machine;
pub mod money;
pub mod one_time;
pub mod session;
pub mod testing;
pub mod validator;

pub use allocation::{AllocationError, AllocationSet, BeneficiaryId, BeneficiaryKind, BeneficiaryRef};
pub use capacity::{capacity_for, CapacityCalculator, MIN_SHARE};
pub use collaborator::{
    Activation, BeneficiaryPayload, Checkout, CollaboratorError, CollectiveCause,
    CollectiveDetail, CreateDonationBox, DonationBoxRecord, DonationCollaborator,
    OneTimeDonationRequest, UpdateDonationBox,
};
pub use collective::{CollectiveCache, ExpansionPending, ExpansionState};
pub use config::{BackendConfig, ConfigError, EngineConfig};
pub use distribution::{DistributionCalculator, Share};
pub use fees::{BlendedSchedule, FeeBreakdown, FeeSchedule, FeeScheduleKind, TieredSchedule};
#[cfg(feature = "http")]
pub use http::HttpCollaborator;
pub use machine::{
    ActivationOutcome, BoxAction, DonationBox, DonationBoxMachine, DonationBoxStatus,
    TransitionError,
};
pub use money::{format_dollars, round_cents, GrossAmount, Money, AMOUNT_STEP, MIN_GROSS};
pub use one_time::{CheckoutError, OneTimeGift};
pub use session::{summarize, AllocationSummary, EditingSession};
pub use testing::InMemoryCollaborator;
pub use validator::{AllocationOp, AllocationValidator, CapacityMode, Decision, Rejection};
