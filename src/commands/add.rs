use anyhow::Result;

use listing_search::core::listing::ListingDraft;
use listing_search::store::ListingStore;

use super::{print_write_report, write_report_json};

pub fn run(draft: ListingDraft, json: bool) -> Result<()> {
    let store = ListingStore::open_cwd()?;
    let report = store.indexer().create(&draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&write_report_json(&report))?);
    } else {
        print_write_report("Created", &report);
    }
    Ok(())
}
