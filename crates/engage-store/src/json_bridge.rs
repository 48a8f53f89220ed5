use std::fs;
use std::path::Path;

use engage_core::Persistence;
use engage_core::export::{self, EngagementExport};

use crate::error::{Result, StoreError};

/// Write a JSON snapshot of the persisted keys to `path`.
pub fn export_json_file(store: &Persistence, path: &Path) -> Result<EngagementExport> {
    let json = engage_core::export_json(store)
        .map_err(|e| StoreError::InvalidData(format!("serialize export: {e}")))?;
    fs::write(path, &json)?;
    export::import_json(&json).map_err(|e| StoreError::InvalidData(e.to_string()))
}

/// Read a snapshot from `path` and write its known keys into `store`.
/// Returns how many keys were written.
pub fn import_json_file(store: &mut Persistence, path: &Path) -> Result<usize> {
    let json = fs::read_to_string(path)?;
    let snapshot = export::import_json(&json)
        .map_err(|e| StoreError::InvalidData(format!("{}: {e}", path.display())))?;
    Ok(export::apply(&snapshot, store))
}
