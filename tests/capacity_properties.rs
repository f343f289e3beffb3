use givebox::{
    AllocationValidator, BeneficiaryKind, BeneficiaryRef, BlendedSchedule, CapacityCalculator,
    CapacityMode, Decision, EditingSession, FeeSchedule, Rejection, TieredSchedule,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn dollars_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[derive(Debug, Clone)]
enum Edit {
    Up,
    Down,
    Typed(i64),
    Toggle(u8),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        Just(Edit::Up),
        Just(Edit::Down),
        (500i64..20_000).prop_map(Edit::Typed),
        (0u8..12).prop_map(Edit::Toggle),
    ]
}

fn session_with_share(min_share_cents: i64) -> EditingSession {
    EditingSession::new(AllocationValidator::new(
        CapacityCalculator::new(dollars_from_cents(min_share_cents)),
        CapacityMode::Slots,
    ))
}

fn run(session: &mut EditingSession, edits: &[Edit], schedule: &dyn FeeSchedule) {
    for edit in edits {
        match edit {
            Edit::Up => session.increase_amount(schedule),
            Edit::Down => session.decrease_amount(schedule),
            Edit::Typed(cents) => session.set_amount(dollars_from_cents(*cents), schedule),
            Edit::Toggle(n) => session.toggle(BeneficiaryRef::cause(format!("cause-{n}")), schedule),
        };
    }
}

proptest! {
    #[test]
    fn capacity_brackets_the_net_amount(cents in 500i64..1_000_000) {
        let gross = dollars_from_cents(cents);
        let calc = CapacityCalculator::default();
        for schedule in [&TieredSchedule::default() as &dyn FeeSchedule, &BlendedSchedule::default()] {
            let net = schedule.compute_fees(gross).net;
            let capacity = Decimal::from(calc.capacity_for(net));
            prop_assert!(capacity * calc.min_share() <= net.max(Decimal::ZERO));
            prop_assert!((capacity + Decimal::ONE) * calc.min_share() > net);
        }
    }

    #[test]
    fn capacity_never_drops_as_gross_grows(a in 500i64..500_000, b in 500i64..500_000) {
        let (low, high) = (a.min(b), a.max(b));
        let calc = CapacityCalculator::default();
        for schedule in [&TieredSchedule::default() as &dyn FeeSchedule, &BlendedSchedule::default()] {
            prop_assert!(
                calc.capacity_for_gross(dollars_from_cents(low), schedule)
                    <= calc.capacity_for_gross(dollars_from_cents(high), schedule)
            );
        }
    }

    #[test]
    fn edits_never_exceed_capacity(
        min_share_cents in 100i64..400,
        edits in proptest::collection::vec(edit(), 0..40),
    ) {
        let schedule = TieredSchedule::default();
        let mut session = session_with_share(min_share_cents);
        for edit in edits {
            run(&mut session, std::slice::from_ref(&edit), &schedule);
            let summary = session.summary(&schedule);
            prop_assert!(summary.count <= summary.capacity, "{:?} after {:?}", summary, edit);
        }
    }

    #[test]
    fn add_then_remove_restores_the_set(
        edits in proptest::collection::vec(edit(), 0..20),
        extra in 12u8..20,
    ) {
        let schedule = TieredSchedule::default();
        let mut session = session_with_share(20);
        run(&mut session, &edits, &schedule);
        let before = session.allocation().clone();
        let id = format!("cause-{extra}");
        if session.add(BeneficiaryRef::cause(id.clone()), &schedule).is_accept() {
            prop_assert!(session.remove(&id, BeneficiaryKind::Cause, &schedule).is_accept());
        }
        prop_assert_eq!(session.allocation(), &before);
    }

    #[test]
    fn removal_is_never_a_capacity_rejection(
        min_share_cents in 100i64..400,
        edits in proptest::collection::vec(edit(), 0..30),
        target in 0u8..12,
    ) {
        let schedule = TieredSchedule::default();
        let mut session = session_with_share(min_share_cents);
        run(&mut session, &edits, &schedule);
        let id = format!("cause-{target}");
        let present = session.allocation().contains(&id, BeneficiaryKind::Cause);
        match session.remove(&id, BeneficiaryKind::Cause, &schedule) {
            Decision::Accept => prop_assert!(present),
            Decision::Reject(Rejection::Allocation(_)) => prop_assert!(!present),
            Decision::Reject(other) => prop_assert!(false, "unexpected rejection: {}", other),
        }
    }
}
