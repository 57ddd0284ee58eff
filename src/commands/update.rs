//! Update and set-status commands

use anyhow::{bail, Result};

use listing_search::core::listing::{ListingStatus, ListingUpdate};
use listing_search::store::ListingStore;

use super::{print_write_report, write_report_json};

pub fn run(id: i64, changes: ListingUpdate, json: bool) -> Result<()> {
    if changes.is_empty() {
        bail!("Nothing to update. Pass at least one field, e.g. --title or --price.");
    }

    let store = ListingStore::open_cwd()?;
    let report = store.indexer().update(id, &changes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&write_report_json(&report))?);
    } else {
        print_write_report("Updated", &report);
    }
    Ok(())
}

pub fn run_set_status(id: i64, status: &str, json: bool) -> Result<()> {
    let status: ListingStatus = status.parse()?;

    let store = ListingStore::open_cwd()?;
    let report = store.indexer().set_status(id, status)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&write_report_json(&report))?);
    } else {
        print_write_report("Marked", &report);
    }
    Ok(())
}
