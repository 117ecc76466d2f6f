use std::fs;
use std::path::Path;

use armory_core::{BindingSnapshot, BindingStore, KeyValueStore, SNAPSHOT_VERSION};

use crate::error::{Result, StoreError};

/// Serialize the explicit bindings as pretty JSON.
pub fn export_json_string<P: KeyValueStore>(bindings: &BindingStore<P>) -> Result<String> {
    serde_json::to_string_pretty(&bindings.snapshot())
        .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
}

pub fn export_json_file<P: KeyValueStore>(bindings: &BindingStore<P>, path: &Path) -> Result<()> {
    let json = export_json_string(bindings)?;
    fs::write(path, json).map_err(|e| {
        StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
    })
}

/// Parse a snapshot, rejecting versions newer than this build understands.
pub fn parse_snapshot(json: &str) -> Result<BindingSnapshot> {
    let snapshot: BindingSnapshot = serde_json::from_str(json)
        .map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::InvalidData(format!(
            "snapshot version {} is newer than supported version {SNAPSHOT_VERSION}",
            snapshot.version
        )));
    }
    Ok(snapshot)
}

/// Replace every explicit binding with the snapshot's. Returns the number
/// of bindings written. Nothing changes when the snapshot is invalid.
pub fn import_json_str<P: KeyValueStore>(bindings: &mut BindingStore<P>, json: &str) -> Result<usize> {
    let snapshot = parse_snapshot(json)?;
    bindings
        .restore(&snapshot)
        .map_err(|e| StoreError::InvalidData(format!("invalid binding: {e}")))
}

pub fn import_json_file<P: KeyValueStore>(
    bindings: &mut BindingStore<P>,
    path: &Path,
) -> Result<usize> {
    let json = fs::read_to_string(path).map_err(|e| {
        StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
    })?;
    import_json_str(bindings, &json)
}
