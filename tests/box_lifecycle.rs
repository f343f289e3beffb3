use givebox::{
    ActivationOutcome, AllocationSet, AllocationValidator, BeneficiaryKind, BeneficiaryRef,
    BoxAction, CapacityCalculator, CapacityMode, CollaboratorError, DonationBoxMachine,
    DonationBoxStatus, EditingSession, ExpansionState, GrossAmount, InMemoryCollaborator,
    Rejection, TieredSchedule, TransitionError,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn machine_with(backend: &Arc<InMemoryCollaborator>, validator: AllocationValidator) -> DonationBoxMachine {
    DonationBoxMachine::new(backend.clone(), Arc::new(TieredSchedule::default()), validator)
}

#[tokio::test]
async fn full_lifecycle_with_a_collective() {
    let tiered = TieredSchedule::default();
    let backend = Arc::new(InMemoryCollaborator::new());
    backend.add_collective("k1", &["c1", "c2", "c3"]);
    backend.set_activation_checkout(Some("https://pay.test/session/1".into()));

    let mut session = EditingSession::new(AllocationValidator::default());
    assert!(session.set_amount(dec!(25), &tiered).is_accept());
    assert!(session.add(BeneficiaryRef::cause("c2"), &tiered).is_accept());
    assert!(session.add(BeneficiaryRef::collective("k1"), &tiered).is_accept());

    let mut machine = machine_with(&backend, AllocationValidator::default());
    machine.create_from_session(&mut session).await.unwrap();
    assert_eq!(machine.status(), DonationBoxStatus::PendingActivation);
    assert_eq!(machine.donation_box().id.as_deref(), Some("box-1"));

    let sent = backend.last_create().unwrap();
    assert_eq!(sent.monthly_amount, dec!(25));
    let lines: Vec<(&str, Option<&str>)> = sent
        .causes
        .iter()
        .map(|line| (line.cause_id.as_str(), line.attributed_collective_id.as_deref()))
        .collect();
    assert_eq!(
        lines,
        vec![("c2", None), ("c1", Some("k1")), ("c3", Some("k1"))]
    );

    let outcome = machine.activate().await.unwrap();
    assert_eq!(
        outcome,
        ActivationOutcome::CheckoutRequired("https://pay.test/session/1".into())
    );
    assert!(!machine.is_effectively_active());
    machine.confirm_checkout().unwrap();
    assert!(machine.is_effectively_active());

    let next = machine.combined_allocation(
        &[("c2", BeneficiaryKind::Cause)],
        &[BeneficiaryRef::cause("c9")],
    );
    machine
        .update(GrossAmount::typed(dec!(30)), next)
        .await
        .unwrap();
    let update = backend.last_update().unwrap();
    assert_eq!(update.monthly_amount, Some(dec!(30)));
    assert_eq!(update.cause_ids, Some(vec!["c9".to_string()]));
    assert_eq!(update.collective_ids, Some(vec!["k1".to_string()]));

    machine.cancel().await.unwrap();
    assert_eq!(machine.status(), DonationBoxStatus::Cancelled);
    let err = machine
        .update(GrossAmount::typed(dec!(30)), machine.donation_box().allocation.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::InvalidTransition {
            from: DonationBoxStatus::Cancelled,
            action: BoxAction::Update,
        }
    );
}

#[tokio::test]
async fn failed_expansion_keeps_the_draft_and_can_be_retried() {
    let tiered = TieredSchedule::default();
    let backend = Arc::new(InMemoryCollaborator::new());
    let mut session = EditingSession::new(AllocationValidator::default());
    session.set_amount(dec!(20), &tiered);
    session.add(BeneficiaryRef::collective("k7"), &tiered);

    let mut machine = machine_with(&backend, AllocationValidator::default());
    let err = machine.create_from_session(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Collaborator(CollaboratorError::Status { status: 404, .. })
    ));
    assert_eq!(machine.status(), DonationBoxStatus::Draft);
    assert_eq!(backend.calls("create_donation_box"), 0);
    assert!(matches!(
        session.expansions().state("k7"),
        Some(ExpansionState::Failed(_))
    ));

    backend.add_collective("k7", &["c1"]);
    machine.create_from_session(&mut session).await.unwrap();
    assert_eq!(machine.status(), DonationBoxStatus::PendingActivation);
    assert_eq!(backend.calls("get_collective_by_id"), 2);
}

#[tokio::test]
async fn expanded_causes_mode_checks_member_count_before_create() {
    let tiered = TieredSchedule::default();
    let members: Vec<String> = (0..25).map(|i| format!("m{i}")).collect();
    let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();
    let backend = Arc::new(InMemoryCollaborator::new());
    backend.add_collective("big", &member_refs);

    let validator = AllocationValidator::new(CapacityCalculator::default(), CapacityMode::ExpandedCauses);
    let mut session = EditingSession::new(validator);
    // Unexpanded, the collective occupies one slot.
    assert!(session.add(BeneficiaryRef::collective("big"), &tiered).is_accept());

    let mut machine = machine_with(&backend, validator);
    let err = machine.create_from_session(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Rejected(Rejection::SelectionExceedsCapacity { excess: 5, capacity: 20, .. })
    ));
    assert_eq!(err.to_string(), "remove 5 beneficiaries to fit $5.00");
    assert_eq!(machine.status(), DonationBoxStatus::Draft);

    assert!(session.set_amount(dec!(10), &tiered).is_accept());
    machine.create_from_session(&mut session).await.unwrap();
    assert_eq!(backend.last_create().unwrap().causes.len(), 25);
    assert_eq!(machine.summary(&tiered).count, 25);
}

#[tokio::test]
async fn pause_cancels_and_empty_updates_are_refused() {
    let backend = Arc::new(InMemoryCollaborator::new());
    let mut machine = machine_with(&backend, AllocationValidator::default());
    let set: AllocationSet = vec![BeneficiaryRef::cause("c1")].into_iter().collect();
    machine
        .create(GrossAmount::typed(dec!(15)), &set, &mut Default::default())
        .await
        .unwrap();
    assert_eq!(machine.activate().await.unwrap(), ActivationOutcome::Active);

    let err = machine
        .update(GrossAmount::typed(dec!(15)), AllocationSet::new())
        .await
        .unwrap_err();
    assert_eq!(err, TransitionError::Rejected(Rejection::EmptyAllocation));
    assert_eq!(backend.calls("update_donation_box"), 0);

    machine.pause().await.unwrap();
    assert_eq!(machine.status(), DonationBoxStatus::Cancelled);
    assert_eq!(backend.calls("cancel_donation_box"), 1);
}
