use anyhow::{bail, Result};
use regsync_core::{RunOutcome, RunSummary};
use std::path::Path;
use std::sync::Arc;

pub fn run(config: &Path, json: bool) -> Result<()> {
    let store = Arc::new(super::load_store(config)?);
    let summary = regsync_core::run_once(store);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if let RunOutcome::Failed { reason } = &summary.outcome {
        bail!("synchronization failed: {reason}");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let outcome = match &summary.outcome {
        RunOutcome::Completed => "completed".to_string(),
        RunOutcome::NoTickets => "completed (filter returned no tickets)".to_string(),
        RunOutcome::Failed { reason } => format!("failed: {reason}"),
    };
    let elapsed = summary.finished_at - summary.started_at;
    println!("run       {}", summary.id);
    println!("outcome   {outcome}");
    println!("fetched   {}", summary.fetched);
    println!("written   {}", summary.processed);
    println!("skipped   {}", summary.skipped);
    println!("duration  {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
}
