use givebox::{
    ActivationOutcome, AllocationValidator, BeneficiaryRef, BlendedSchedule, DonationBoxMachine,
    EditingSession, InMemoryCollaborator, TieredSchedule,
};
use rust_decimal::Decimal;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let setup = TieredSchedule::default();
    let backend = Arc::new(InMemoryCollaborator::new());
    backend.add_collective("clean-water", &["wells-for-all", "river-watch"]);

    let mut session = EditingSession::new(AllocationValidator::default());
    session.set_amount(Decimal::from(25), &setup);
    session.add(BeneficiaryRef::cause("food-bank"), &setup);
    session.add(BeneficiaryRef::collective("clean-water"), &setup);

    let summary = session.summary(&BlendedSchedule::default());
    println!(
        "{} a month, net {} after fees, {} of {} slots used",
        session.gross(),
        summary.fees.net,
        summary.count,
        summary.capacity
    );

    let mut machine = DonationBoxMachine::new(
        backend.clone(),
        Arc::new(setup),
        AllocationValidator::default(),
    );
    if let Err(err) = machine.create_from_session(&mut session).await {
        eprintln!("Create failed: {err}");
        std::process::exit(1);
    }
    match machine.activate().await {
        Ok(ActivationOutcome::Active) => println!("Donation box is active."),
        Ok(ActivationOutcome::CheckoutRequired(url)) => println!("Finish checkout at {url}"),
        Err(err) => {
            eprintln!("Activation failed: {err}");
            std::process::exit(1);
        }
    }
    if let Some(request) = backend.last_create() {
        for line in request.causes {
            println!(
                "  {} (via {})",
                line.cause_id,
                line.attributed_collective_id.as_deref().unwrap_or("direct")
            );
        }
    }
}
