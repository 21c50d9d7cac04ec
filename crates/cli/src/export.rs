//! JSON export of validated blocks.

use std::path::Path;

use timegap_core::consolidation::{ConsolidatedBlock, TimeEntryRecord};
use timegap_core::error::Error;

/// Write `blocks` to `path` as a JSON array of wire records.
pub fn write_blocks<'a>(
    path: &Path,
    blocks: impl IntoIterator<Item = &'a ConsolidatedBlock>,
) -> Result<usize, Error> {
    let records: Vec<TimeEntryRecord> = blocks.into_iter().map(|b| b.to_record()).collect();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json)
        .map_err(|e| Error::Internal(format!("failed to write {}: {e}", path.display())))?;
    Ok(records.len())
}
