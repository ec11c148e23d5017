//! Working-directory watcher.
//!
//! The server periodically lists its working directory and pushes a
//! `DirList` to connected clients when the listing changed. Scanning is a
//! plain directory read on a timer rather than a filesystem-event
//! subscription; the listing is tiny and the poll interval bounds staleness.

use std::collections::HashSet;
use std::path::Path;

use crate::protocol::{DirEntry, DirEntryType};

/// Notebook file extension.
const NOTEBOOK_EXT: &str = ".tsnb";

/// List regular files in `base`, classified and sorted by path.
///
/// `loaded` holds the notebook paths currently loaded in memory; those
/// show up as `LoadedNotebook`. Hidden files are skipped.
pub fn scan_dir(base: &Path, loaded: &HashSet<String>) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let read_dir = match std::fs::read_dir(base) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            tracing::warn!("cannot list {}: {}", base.display(), e);
            return entries;
        }
    };

    for entry in read_dir.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let entry_type = if name.ends_with(NOTEBOOK_EXT) {
            if loaded.contains(&name) {
                DirEntryType::LoadedNotebook
            } else {
                DirEntryType::Notebook
            }
        } else {
            DirEntryType::File
        };
        entries.push(DirEntry {
            entry_type,
            path: name,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
