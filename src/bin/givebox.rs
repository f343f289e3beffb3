//! Command-line front end for the givebox engine.
//!
//! Offline commands quote fees, capacity and shares and check a planned
//! selection.  With the `http` feature the `box` and `give` commands drive a
//! real backend configured through `--config` or `GIVEBOX_BACKEND_URL`.

use givebox::{
    BeneficiaryRef, DistributionCalculator, EditingSession, EngineConfig, FeeSchedule,
    FeeScheduleKind, Money,
};
#[cfg(feature = "http")]
use givebox::{
    ActivationOutcome, AllocationSet, DonationBox, DonationBoxMachine, DonationCollaborator,
    GrossAmount, HttpCollaborator, OneTimeGift,
};
use rust_decimal::Decimal;
use std::env;
use std::path::Path;
#[cfg(feature = "http")]
use std::{fs, sync::Arc};
use tracing_subscriber::EnvFilter;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_help() {
    println!("Usage: givebox <command> [args]");
    println!("  fees <amount> [--schedule blended|tiered] [--config <file>]");
    println!("  capacity <amount> [--schedule blended|tiered] [--config <file>]");
    println!("  share <net> <count>");
    println!("  plan --amount <X> [--cause <id>]... [--collective <id>]... [--config <file>]");
    #[cfg(feature = "http")]
    {
        println!("  box <create|activate|update|cancel> --state <box.json> [flags]");
        println!("  give --amount <X> [--cause <id>]... [--collective <id>]... [--config <file>]");
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let command = args.next();
    match command.as_deref() {
        Some("fees") => cmd_fees(args.collect()),
        Some("capacity") => cmd_capacity(args.collect()),
        Some("share") => cmd_share(args.collect()),
        Some("plan") => cmd_plan(args.collect()),
        #[cfg(feature = "http")]
        Some("box") => {
            let sub = args.next().unwrap_or_else(|| {
                eprintln!("Usage: givebox box <create|activate|update|cancel> ...");
                std::process::exit(1);
            });
            handle_box(&sub, args.collect());
        }
        #[cfg(feature = "http")]
        Some("give") => cmd_give(args.collect()),
        Some("-h") | Some("--help") | Some("help") | None => print_help(),
        Some(other) => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn parse_money(flag: &str, raw: &str) -> Money {
    raw.trim()
        .trim_start_matches('$')
        .parse::<Decimal>()
        .unwrap_or_else(|_| fatal(&format!("invalid {flag}: {raw}")))
}

fn load_config(path: Option<&str>) -> EngineConfig {
    EngineConfig::load(path.map(Path::new))
        .unwrap_or_else(|err| fatal(&format!("failed to load config: {err}")))
}

/// Flags shared by the quoting commands.
struct QuoteArgs {
    amount: Money,
    schedule: Option<FeeScheduleKind>,
    config: EngineConfig,
}

fn parse_quote_args(usage: &str, args: Vec<String>) -> QuoteArgs {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{usage}");
        std::process::exit(0);
    }
    let mut amount = None;
    let mut schedule = None;
    let mut config_path = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--schedule" => {
                let raw = iter
                    .next()
                    .unwrap_or_else(|| fatal("--schedule expects a value"));
                schedule = Some(
                    raw.parse::<FeeScheduleKind>()
                        .unwrap_or_else(|err| fatal(&err)),
                );
            }
            "--config" => {
                config_path = Some(
                    iter.next()
                        .unwrap_or_else(|| fatal("--config expects a value")),
                );
            }
            other if amount.is_none() && !other.starts_with("--") => {
                amount = Some(parse_money("amount", other));
            }
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    QuoteArgs {
        amount: amount.unwrap_or_else(|| fatal(usage)),
        schedule,
        config: load_config(config_path.as_deref()),
    }
}

fn cmd_fees(args: Vec<String>) {
    let quote = parse_quote_args(
        "Usage: givebox fees <amount> [--schedule blended|tiered] [--config <file>]",
        args,
    );
    let kind = quote.schedule.unwrap_or(quote.config.review_schedule);
    let fees = kind.schedule().compute_fees(quote.amount);
    println!("schedule: {kind}");
    println!("gross: ${:.2}", quote.amount);
    println!("processor fee: ${:.2}", fees.processor_fee);
    println!("platform fee: ${:.2}", fees.platform_fee);
    println!("net: ${:.2}", fees.net);
}

fn cmd_capacity(args: Vec<String>) {
    let quote = parse_quote_args(
        "Usage: givebox capacity <amount> [--schedule blended|tiered] [--config <file>]",
        args,
    );
    let kind = quote.schedule.unwrap_or(quote.config.setup_schedule);
    let schedule = kind.schedule();
    let validator = quote.config.validator();
    let net = schedule.compute_fees(quote.amount).net;
    let capacity = validator
        .capacity()
        .capacity_for_gross(quote.amount, schedule.as_ref());
    println!("schedule: {kind}");
    println!("net: ${net:.2}");
    println!(
        "capacity: {capacity} beneficiaries at ${:.2} minimum",
        validator.capacity().min_share()
    );
}

fn cmd_share(args: Vec<String>) {
    if args.len() != 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        fatal("Usage: givebox share <net> <count>");
    }
    let net = parse_money("net", &args[0]);
    let count = args[1]
        .parse::<u32>()
        .unwrap_or_else(|_| fatal(&format!("invalid count: {}", args[1])));
    let share = DistributionCalculator.share_for(net, count);
    println!("per beneficiary: ${:.2}", share.per_beneficiary_display());
    println!("percentage: {}%", share.percentage);
}

/// Amount and selection flags shared by `plan`, `give` and `box`.
#[derive(Default)]
struct SelectionArgs {
    amount: Option<Money>,
    beneficiaries: Vec<BeneficiaryRef>,
    config_path: Option<String>,
    state_path: Option<String>,
}

fn parse_selection_args(args: Vec<String>) -> SelectionArgs {
    let mut parsed = SelectionArgs::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .unwrap_or_else(|| fatal(&format!("{flag} expects a value")))
        };
        match arg.as_str() {
            "--amount" => parsed.amount = Some(parse_money("--amount", &value("--amount"))),
            "--cause" => parsed
                .beneficiaries
                .push(BeneficiaryRef::cause(value("--cause"))),
            "--collective" => parsed
                .beneficiaries
                .push(BeneficiaryRef::collective(value("--collective"))),
            "--config" => parsed.config_path = Some(value("--config")),
            "--state" => parsed.state_path = Some(value("--state")),
            other => fatal(&format!("unknown argument: {other}")),
        }
    }
    parsed
}

/// Replays the selection through an editing session, reporting rejections.
fn build_session(config: &EngineConfig, selection: &SelectionArgs) -> EditingSession {
    let schedule = config.setup_schedule();
    let mut session = EditingSession::from_config(config);
    if let Some(amount) = selection.amount {
        if let Err(reason) = session
            .set_amount(amount, schedule.as_ref())
            .into_result()
        {
            fatal(&format!("amount rejected: {reason}"));
        }
    }
    for beneficiary in &selection.beneficiaries {
        if let Err(reason) = session
            .add(beneficiary.clone(), schedule.as_ref())
            .into_result()
        {
            fatal(&format!("{} {} rejected: {reason}", beneficiary.kind, beneficiary.id));
        }
    }
    session
}

fn cmd_plan(args: Vec<String>) {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!(
            "Usage: givebox plan --amount <X> [--cause <id>]... [--collective <id>]... [--config <file>]"
        );
        return;
    }
    let selection = parse_selection_args(args);
    let config = load_config(selection.config_path.as_deref());
    let session = build_session(&config, &selection);
    let report = serde_json::json!({
        "setup": session.summary(config.setup_schedule().as_ref()),
        "review": session.summary(config.review_schedule().as_ref()),
        "allocation": session.allocation(),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{text}"),
        Err(err) => fatal(&format!("failed to encode plan: {err}")),
    }
}

#[cfg(feature = "http")]
fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| fatal(&format!("failed to start runtime: {err}")))
}

#[cfg(feature = "http")]
fn collaborator(config: &EngineConfig) -> Arc<dyn DonationCollaborator> {
    let backend = config
        .backend
        .as_ref()
        .unwrap_or_else(|| fatal("no backend configured (set backend.baseUrl or GIVEBOX_BACKEND_URL)"));
    let client = HttpCollaborator::from_config(backend)
        .unwrap_or_else(|err| fatal(&format!("failed to build backend client: {err}")));
    Arc::new(client)
}

#[cfg(feature = "http")]
fn load_box(path: &Path) -> DonationBox {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|err| fatal(&format!("failed to read {}: {err}", path.display())));
    serde_json::from_str(&text)
        .unwrap_or_else(|err| fatal(&format!("failed to parse {}: {err}", path.display())))
}

#[cfg(feature = "http")]
fn save_box(path: &Path, donation_box: &DonationBox) {
    let text = serde_json::to_string_pretty(donation_box)
        .unwrap_or_else(|err| fatal(&format!("failed to encode donation box: {err}")));
    fs::write(path, text)
        .unwrap_or_else(|err| fatal(&format!("failed to write {}: {err}", path.display())));
}

#[cfg(feature = "http")]
fn handle_box(sub: &str, tail: Vec<String>) {
    if tail.iter().any(|a| a == "-h" || a == "--help") {
        println!("Usage: givebox box <create|activate|update|cancel> --state <box.json> [flags]");
        println!("  create --amount <X> [--cause <id>]... [--collective <id>]...");
        println!("  update [--amount <X>] [--cause <id>]... [--collective <id>]...");
        return;
    }
    let selection = parse_selection_args(tail);
    let config = load_config(selection.config_path.as_deref());
    let state_path = selection
        .state_path
        .clone()
        .unwrap_or_else(|| fatal("--state is required"));
    let state_path = Path::new(&state_path);
    let collab = collaborator(&config);
    let schedule: Arc<dyn FeeSchedule> = Arc::from(config.setup_schedule());
    let rt = runtime();

    let saved = match sub {
        "create" => {
            let mut session = build_session(&config, &selection);
            let mut machine = DonationBoxMachine::new(collab, schedule, config.validator());
            rt.block_on(machine.create_from_session(&mut session))
                .unwrap_or_else(|err| fatal(&format!("create failed: {err}")));
            println!("created donation box; run `givebox box activate` to start billing");
            machine.donation_box().clone()
        }
        "activate" => {
            let mut machine =
                DonationBoxMachine::resume(load_box(state_path), collab, schedule, config.validator());
            match rt.block_on(machine.activate()) {
                Ok(ActivationOutcome::Active) => println!("donation box active"),
                Ok(ActivationOutcome::CheckoutRequired(url)) => {
                    println!("complete checkout at: {url}")
                }
                Err(err) => fatal(&format!("activate failed: {err}")),
            }
            machine.donation_box().clone()
        }
        "update" => {
            let current = load_box(state_path);
            let amount = selection
                .amount
                .map(GrossAmount::typed)
                .unwrap_or(current.gross_amount);
            let set = if selection.beneficiaries.is_empty() {
                current.allocation.clone()
            } else {
                selection.beneficiaries.iter().cloned().collect::<AllocationSet>()
            };
            let mut machine =
                DonationBoxMachine::resume(current, collab, schedule, config.validator());
            rt.block_on(machine.update(amount, set))
                .unwrap_or_else(|err| fatal(&format!("update failed: {err}")));
            println!("donation box updated");
            machine.donation_box().clone()
        }
        "cancel" => {
            let mut machine =
                DonationBoxMachine::resume(load_box(state_path), collab, schedule, config.validator());
            rt.block_on(machine.cancel())
                .unwrap_or_else(|err| fatal(&format!("cancel failed: {err}")));
            println!("donation box cancelled");
            machine.donation_box().clone()
        }
        other => fatal(&format!("unknown box subcommand: {other}")),
    };
    save_box(state_path, &saved);
}

#[cfg(feature = "http")]
fn cmd_give(args: Vec<String>) {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!(
            "Usage: givebox give --amount <X> [--cause <id>]... [--collective <id>]... [--config <file>]"
        );
        return;
    }
    let selection = parse_selection_args(args);
    let config = load_config(selection.config_path.as_deref());
    let gift = OneTimeGift::new(build_session(&config, &selection));
    let collab = collaborator(&config);
    let schedule = config.setup_schedule();
    let url = runtime()
        .block_on(gift.checkout(schedule.as_ref(), collab.as_ref()))
        .unwrap_or_else(|err| fatal(&format!("checkout failed: {err}")));
    println!("complete checkout at: {url}");
}
