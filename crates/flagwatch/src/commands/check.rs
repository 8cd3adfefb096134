use clap::ArgMatches;
use serde_json::json;
use tracing::{error, info};

use flagwatch_core::{DispatchReport, PollOutcome};

use super::helpers;

pub(crate) fn handle_check_command(
    matches: &ArgMatches,
    no_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = helpers::load_config(matches)?;
    let json = matches.get_flag("json");
    let store = helpers::open_store(&config, no_store)?;
    let poller = helpers::build_poller(&config, store, json)?;

    let outcome = helpers::runtime()?.block_on(poller.poll());

    match outcome {
        PollOutcome::Completed { advanced, report } => {
            info!(
                event = "cli.check_completed",
                advanced = advanced.len(),
                invoked = report.invoked.len(),
            );
            if json {
                let advanced: serde_json::Map<String, serde_json::Value> = advanced
                    .iter()
                    .map(|(category, watermark)| (category.to_string(), json!(watermark)))
                    .collect();
                println!(
                    "{}",
                    json!({
                        "updated": report.invoked,
                        "failed": failed_categories(&report),
                        "watermarks": advanced,
                    })
                );
            } else if report.invoked.is_empty() && report.failed.is_empty() {
                println!("No updates.");
            }
            for failure in &report.failed {
                eprintln!("Handler for '{}' failed: {}", failure.category, failure.error);
            }
            Ok(())
        }
        PollOutcome::Failed(e) => {
            eprintln!("Poll failed: {e}");
            error!(event = "cli.check_failed", error = %e);
            Err(e.into())
        }
        PollOutcome::Skipped | PollOutcome::Cancelled => {
            error!(event = "cli.check_failed", reason = "poll not issued");
            Err("poll was not issued".into())
        }
    }
}

fn failed_categories(report: &DispatchReport) -> Vec<String> {
    report
        .failed
        .iter()
        .map(|failure| failure.category.to_string())
        .collect()
}
