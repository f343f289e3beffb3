//! Single gift checkout.

use crate::collaborator::{CollaboratorError, DonationCollaborator, OneTimeDonationRequest};
use crate::fees::FeeSchedule;
use crate::session::EditingSession;
use crate::validator::Rejection;
use thiserror::Error;
use tracing::{info, warn};

/// Why a one-time checkout did not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Local validation refused the gift.
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// A one-time gift being configured.
#[derive(Debug, Clone)]
pub struct OneTimeGift {
    session: EditingSession,
}

impl OneTimeGift {
    /// Wraps an editing session.
    pub fn new(session: EditingSession) -> Self {
        Self { session }
    }

    /// The underlying editing state.
    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    /// Mutable editing state for amount and selection changes.
    pub fn session_mut(&mut self) -> &mut EditingSession {
        &mut self.session
    }

    /// The request `checkout` would send.
    pub fn request(&self) -> OneTimeDonationRequest {
        let set = self.session.allocation();
        let non_empty = |ids: Vec<String>| (!ids.is_empty()).then_some(ids);
        OneTimeDonationRequest {
            amount: self.session.gross().value(),
            cause_ids: non_empty(set.cause_ids()),
            collective_ids: non_empty(set.collective_ids()),
        }
    }

    /// Validates the gift against `schedule` and opens a checkout session.
    ///
    /// Returns the URL the donor must be redirected to.
    pub async fn checkout(
        &self,
        schedule: &dyn FeeSchedule,
        collaborator: &dyn DonationCollaborator,
    ) -> Result<String, CheckoutError> {
        let set = self.session.allocation();
        if set.is_empty() {
            return Err(Rejection::EmptyAllocation.into());
        }
        self.session
            .validator()
            .validate_replacement(
                set,
                self.session.gross().value(),
                schedule,
                self.session.expansions(),
            )
            .into_result()?;
        let request = self.request();
        match collaborator.create_one_time_donation(&request).await {
            Ok(checkout) => {
                info!(amount = %self.session.gross(), count = set.count(), "one-time checkout opened");
                Ok(checkout.checkout_url)
            }
            Err(err) => {
                warn!(error = %err, "one-time checkout failed");
                Err(err.into())
            }
        }
    }

    /// Abandons the gift, clearing the selection.
    pub fn discard(&mut self) {
        self.session.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::BeneficiaryRef;
    use crate::fees::TieredSchedule;
    use crate::testing::InMemoryCollaborator;
    use crate::validator::AllocationValidator;
    use rust_decimal_macros::dec;

    fn gift() -> OneTimeGift {
        OneTimeGift::new(EditingSession::new(AllocationValidator::default()))
    }

    #[tokio::test]
    async fn empty_gift_is_rejected_locally() {
        let backend = InMemoryCollaborator::new();
        let err = gift()
            .checkout(&TieredSchedule::default(), &backend)
            .await
            .unwrap_err();
        assert_eq!(err, CheckoutError::Rejected(Rejection::EmptyAllocation));
        assert_eq!(backend.calls("create_one_time_donation"), 0);
    }

    #[tokio::test]
    async fn checkout_sends_ids_by_kind() {
        let tiered = TieredSchedule::default();
        let backend = InMemoryCollaborator::new();
        let mut gift = gift();
        gift.session_mut().set_amount(dec!(20), &tiered);
        gift.session_mut().add(BeneficiaryRef::cause("c1"), &tiered);
        gift.session_mut().add(BeneficiaryRef::collective("k1"), &tiered);

        let url = gift.checkout(&tiered, &backend).await.unwrap();
        assert!(url.starts_with("https://"));
        let sent = backend.last_one_time().unwrap();
        assert_eq!(sent.amount, dec!(20));
        assert_eq!(sent.cause_ids, Some(vec!["c1".to_string()]));
        assert_eq!(sent.collective_ids, Some(vec!["k1".to_string()]));
    }

    #[test]
    fn request_omits_empty_id_lists() {
        let tiered = TieredSchedule::default();
        let mut gift = gift();
        gift.session_mut().add(BeneficiaryRef::cause("c1"), &tiered);
        let request = gift.request();
        assert_eq!(request.collective_ids, None);
        gift.discard();
        assert!(gift.session().allocation().is_empty());
    }
}
