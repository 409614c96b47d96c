//! `coursesync sync`: one full pull from the LMS into the local store.

use clap::Args;
use coursesync_core::credentials::{load_token, Credential};
use coursesync_core::storage::config::resolve_base_url;
use coursesync_core::{Config, CredentialError, SyncEngine, SyncReport};

use super::Context;

#[derive(Args)]
pub struct SyncArgs {
    /// LMS base URL or known college name (overrides lms.base_url)
    #[arg(long)]
    base_url: Option<String>,
    /// Access token (overrides the stored token)
    #[arg(long)]
    token: Option<String>,
    /// Owner the synced rows belong to (overrides lms.owner)
    #[arg(long)]
    owner: Option<String>,
    /// Print the sync report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SyncArgs, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let base_url = match args.base_url {
        Some(input) => resolve_base_url(&input)?,
        None if !config.lms.base_url.is_empty() => config.lms.base_url.clone(),
        None => {
            return Err(
                "no LMS base URL configured; pass --base-url or run `coursesync config college NAME`"
                    .into(),
            )
        }
    };
    let token = match args.token {
        Some(token) => token.trim().to_string(),
        None => load_token()?,
    };
    if token.is_empty() {
        return Err(CredentialError::EmptyToken.into());
    }
    let owner = args.owner.unwrap_or_else(|| config.lms.owner.clone());
    let credential = Credential::new(base_url, token);

    let engine = SyncEngine::from_config(&config)?;
    let mut store = ctx.store()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(engine.sync(&mut store, &credential, &owner))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &owner);
    }
    Ok(())
}

fn print_report(report: &SyncReport, owner: &str) {
    if report.courses == 0 {
        println!("No active courses found for {owner}");
        return;
    }
    println!(
        "Synced {} course(s) for {owner}: {} events, {} modules, {} module items",
        report.courses, report.events_created, report.modules_created, report.items_created
    );
    if report.assignments_dropped > 0 {
        println!(
            "  {} assignment(s) skipped (no due date this year)",
            report.assignments_dropped
        );
    }
    if report.failed_fetches > 0 {
        println!(
            "  {} fetch(es) failed and were treated as empty; run with -v for details",
            report.failed_fetches
        );
    }
}
