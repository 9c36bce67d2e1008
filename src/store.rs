use crate::data::{AllocError, PreferenceRow};
use crate::preferences::PreferenceStore;
use log::debug;
use std::path::Path;

/// Reads the persisted preference table. A file that does not exist yet is
/// an empty store, not an error.
pub fn load_preferences(path: &Path) -> Result<PreferenceStore, AllocError> {
    if !path.exists() {
        return Ok(PreferenceStore::default());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows: Vec<PreferenceRow> = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    debug!(
        "Loaded {} persisted preference rows from {}",
        rows.len(),
        path.display()
    );
    Ok(PreferenceStore::from_rows(&rows))
}

/// Rewrites the whole table. Called after every store mutation so the file
/// always mirrors the in-memory snapshot.
pub fn save_preferences(path: &Path, store: &PreferenceStore) -> Result<(), AllocError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in store.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
