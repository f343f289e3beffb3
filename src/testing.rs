//! Scripted in-memory collaborator for tests and demos.

use crate::collaborator::{
    Activation, Checkout, CollaboratorError, CollectiveCause, CollectiveDetail,
    CreateDonationBox, DonationBoxRecord, DonationCollaborator, OneTimeDonationRequest,
    UpdateDonationBox,
};
use crate::machine::DonationBoxStatus;
use crate::money::Money;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    collectives: HashMap<String, Vec<String>>,
    failures: HashMap<&'static str, VecDeque<CollaboratorError>>,
    calls: HashMap<&'static str, usize>,
    activation_checkout: Option<String>,
    next_id: u64,
    box_amount: Option<Money>,
    last_create: Option<CreateDonationBox>,
    last_update: Option<UpdateDonationBox>,
    last_one_time: Option<OneTimeDonationRequest>,
}

/// Collaborator that keeps everything in memory and records each call.
///
/// Failures are queued per method name with [`InMemoryCollaborator::fail_next`]
/// and consumed one per call, oldest first.
#[derive(Debug, Default)]
pub struct InMemoryCollaborator {
    inner: Mutex<Inner>,
}

impl InMemoryCollaborator {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a collective and its member causes.
    pub fn add_collective(&self, id: &str, causes: &[&str]) {
        self.lock().collectives.insert(
            id.to_string(),
            causes.iter().map(|c| c.to_string()).collect(),
        );
    }

    /// Queues `error` for a later call to `method`.
    ///
    /// Each call pops one queued failure; calls with an empty queue succeed.
    pub fn fail_next(&self, method: &'static str, error: CollaboratorError) {
        self.lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Checkout URL returned by `activate_donation_box`.
    pub fn set_activation_checkout(&self, url: Option<String>) {
        self.lock().activation_checkout = url;
    }

    /// How many times `method` was called, including failed calls.
    pub fn calls(&self, method: &str) -> usize {
        self.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Last create request received.
    pub fn last_create(&self) -> Option<CreateDonationBox> {
        self.lock().last_create.clone()
    }

    /// Last update request received.
    pub fn last_update(&self) -> Option<UpdateDonationBox> {
        self.lock().last_update.clone()
    }

    /// Last one-time donation request received.
    pub fn last_one_time(&self) -> Option<OneTimeDonationRequest> {
        self.lock().last_one_time.clone()
    }

    fn enter(&self, method: &'static str) -> Result<MutexGuard<'_, Inner>, CollaboratorError> {
        let mut inner = self.lock();
        *inner.calls.entry(method).or_insert(0) += 1;
        let failure = inner.failures.get_mut(method).and_then(VecDeque::pop_front);
        match failure {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }
}

fn record(inner: &mut Inner, status: DonationBoxStatus) -> DonationBoxRecord {
    DonationBoxRecord {
        id: format!("box-{}", inner.next_id),
        monthly_amount: inner.box_amount.unwrap_or(Decimal::ZERO),
        status: Some(status),
        next_charge_date: None,
    }
}

#[async_trait]
impl DonationCollaborator for InMemoryCollaborator {
    async fn create_donation_box(
        &self,
        request: &CreateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError> {
        let mut inner = self.enter("create_donation_box")?;
        inner.next_id += 1;
        inner.box_amount = Some(request.monthly_amount);
        inner.last_create = Some(request.clone());
        Ok(record(&mut inner, DonationBoxStatus::PendingActivation))
    }

    async fn update_donation_box(
        &self,
        update: &UpdateDonationBox,
    ) -> Result<DonationBoxRecord, CollaboratorError> {
        let mut inner = self.enter("update_donation_box")?;
        if inner.next_id == 0 {
            return Err(CollaboratorError::Status {
                status: 404,
                message: "no donation box".into(),
            });
        }
        if let Some(amount) = update.monthly_amount {
            inner.box_amount = Some(amount);
        }
        inner.last_update = Some(update.clone());
        Ok(record(&mut inner, DonationBoxStatus::Active))
    }

    async fn activate_donation_box(&self) -> Result<Activation, CollaboratorError> {
        let inner = self.enter("activate_donation_box")?;
        Ok(Activation {
            checkout_url: inner.activation_checkout.clone(),
        })
    }

    async fn cancel_donation_box(&self) -> Result<(), CollaboratorError> {
        drop(self.enter("cancel_donation_box")?);
        Ok(())
    }

    async fn get_collective_by_id(&self, id: &str) -> Result<CollectiveDetail, CollaboratorError> {
        let inner = self.enter("get_collective_by_id")?;
        match inner.collectives.get(id) {
            Some(causes) => Ok(CollectiveDetail {
                id: id.to_string(),
                causes: causes
                    .iter()
                    .map(|cause| CollectiveCause {
                        id: cause.clone(),
                        name: String::new(),
                    })
                    .collect(),
            }),
            None => Err(CollaboratorError::Status {
                status: 404,
                message: format!("collective {id} not found"),
            }),
        }
    }

    async fn create_one_time_donation(
        &self,
        request: &OneTimeDonationRequest,
    ) -> Result<Checkout, CollaboratorError> {
        let mut inner = self.enter("create_one_time_donation")?;
        inner.next_id += 1;
        let checkout_url = format!("https://checkout.invalid/session/{}", inner.next_id);
        inner.last_one_time = Some(request.clone());
        Ok(Checkout { checkout_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_are_consumed_in_order() {
        let backend = InMemoryCollaborator::new();
        backend.fail_next("cancel_donation_box", CollaboratorError::Transport("first".into()));
        backend.fail_next("cancel_donation_box", CollaboratorError::Transport("second".into()));

        let first = backend.cancel_donation_box().await.unwrap_err();
        assert_eq!(first, CollaboratorError::Transport("first".into()));
        let second = backend.cancel_donation_box().await.unwrap_err();
        assert_eq!(second, CollaboratorError::Transport("second".into()));
        assert!(backend.cancel_donation_box().await.is_ok());
        assert_eq!(backend.calls("cancel_donation_box"), 3);
        assert!(backend.activate_donation_box().await.is_ok());
    }
}
