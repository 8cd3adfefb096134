use clap::ArgMatches;
use tracing::info;

use flagwatch_core::WatermarkRecord;

use super::helpers;

pub(crate) fn handle_watermarks_command(
    matches: &ArgMatches,
    no_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = matches.get_flag("json");

    if no_store {
        if json {
            println!("[]");
        } else {
            println!("Nothing is stored with --no-store.");
        }
        return Ok(());
    }

    let config = helpers::load_store_config()?;
    let store = helpers::open_file_store(&config)?;
    let records = store
        .records()
        .inspect_err(|e| helpers::report(e, "Could not read watermarks"))?;

    info!(event = "cli.watermarks_listed", count = records.len());

    if !json && records.is_empty() {
        println!("No watermarks stored in {}.", store.dir().display());
        return Ok(());
    }

    println!("{}", render_watermarks(&records, json)?);
    Ok(())
}

/// A pretty JSON array of records, or an aligned table.
pub(crate) fn render_watermarks(
    records: &[WatermarkRecord],
    json: bool,
) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(records);
    }

    let width = records
        .iter()
        .map(|r| r.category.as_str().len())
        .max()
        .unwrap_or(0)
        .max("CATEGORY".len());
    let mut lines = vec![format!("{:<width$}  {:>12}  UPDATED", "CATEGORY", "WATERMARK")];
    for record in records {
        lines.push(format!(
            "{:<width$}  {:>12}  {}",
            record.category.as_str(),
            record.watermark.value(),
            record.updated_at.to_rfc3339(),
        ));
    }
    Ok(lines.join("\n"))
}
