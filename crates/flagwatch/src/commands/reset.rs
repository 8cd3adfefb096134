use clap::ArgMatches;
use tracing::info;

use flagwatch_core::{Category, FileStore, StoreError, WatermarkStore};

use super::helpers;

pub(crate) fn handle_reset_command(
    matches: &ArgMatches,
    no_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if no_store {
        println!("Nothing is stored with --no-store.");
        return Ok(());
    }

    let config = helpers::load_store_config()?;
    let store = helpers::open_file_store(&config)?;

    if matches.get_flag("all") {
        let removed =
            reset_all(&store).inspect_err(|e| helpers::report(e, "Could not delete watermarks"))?;
        info!(event = "cli.reset_completed", removed = removed);
        println!("Removed {removed} watermark(s).");
        return Ok(());
    }

    let name = matches
        .get_one::<String>("category")
        .ok_or("Category argument is required (or use --all)")?;
    let category =
        Category::new(name.as_str()).inspect_err(|e| helpers::report(e, "Invalid category"))?;

    let removed = store
        .remove(&category)
        .inspect_err(|e| helpers::report(e, "Could not delete watermark"))?;
    info!(event = "cli.reset_completed", category = %category, removed = removed);
    if removed {
        println!("Removed watermark for '{category}'.");
    } else {
        println!("No watermark stored for '{category}'.");
    }
    Ok(())
}

/// Delete every stored watermark. Returns how many were removed.
pub(crate) fn reset_all(store: &FileStore) -> Result<usize, StoreError> {
    let mut removed = 0;
    for record in store.records()? {
        if store.remove(&record.category)? {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagwatch_core::{Monotonicity, Watermark};
    use tempfile::TempDir;

    fn cat(name: &str) -> Category {
        Category::new(name).unwrap()
    }

    fn seeded_store(dir: &TempDir) -> FileStore {
        let store = FileStore::new(dir.path().to_path_buf(), Monotonicity::Enforce);
        store.set(&cat("messages"), Watermark::new(10)).unwrap();
        store.set(&cat("activity"), Watermark::new(20)).unwrap();
        store
    }

    #[test]
    fn test_reset_all_removes_every_record() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);

        assert_eq!(reset_all(&store).unwrap(), 2);
        assert!(store.records().unwrap().is_empty());
        assert_eq!(store.get(&cat("messages")).unwrap(), None);
    }

    #[test]
    fn test_reset_all_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("missing"), Monotonicity::Enforce);
        assert_eq!(reset_all(&store).unwrap(), 0);
    }

    #[test]
    fn test_reset_one_keeps_other_categories() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);

        assert!(store.remove(&cat("messages")).unwrap());
        assert!(!store.remove(&cat("messages")).unwrap());

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, cat("activity"));
        assert_eq!(store.get(&cat("activity")).unwrap(), Some(Watermark::new(20)));
    }
}
