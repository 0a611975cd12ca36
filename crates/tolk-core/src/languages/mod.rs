//! Language code to display name resolution.
//!
//! The live table sits behind an `RwLock<Arc<..>>`. Reloads build a complete map first
//! and then swap the `Arc` in one write, so a reader sees either the old table or the
//! new one, never a partial merge.

mod builtin;

pub use builtin::BUILTIN_LANGUAGES;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Code → name map. Keys are always lowercase.
pub type LanguageMap = HashMap<String, String>;

/// Normalize a user-supplied language code for lookup or storage.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// The built-in table as an owned map.
pub fn builtin_table() -> LanguageMap {
    BUILTIN_LANGUAGES
        .iter()
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

/// Combine the built-in table with configured entries.
///
/// With `replace` set, only the overlay survives. Otherwise overlay entries are laid
/// on top of `builtin`, winning on key collision. Overlay keys are normalized.
pub fn merge_tables(
    builtin: &LanguageMap,
    overlay: &HashMap<String, String>,
    replace: bool,
) -> LanguageMap {
    let mut merged = if replace {
        LanguageMap::with_capacity(overlay.len())
    } else {
        builtin.clone()
    };
    for (code, name) in overlay {
        merged.insert(normalize_code(code), name.clone());
    }
    merged
}

/// Concurrently readable, atomically swappable language table.
pub struct LanguageTable {
    table: RwLock<Arc<LanguageMap>>,
}

impl LanguageTable {
    pub fn new(table: LanguageMap) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Build from the built-in table and configured overrides.
    pub fn from_config(overlay: &HashMap<String, String>, replace: bool) -> Self {
        Self::new(merge_tables(&builtin_table(), overlay, replace))
    }

    /// Look up the display name for `code`, ignoring case.
    pub fn resolve(&self, code: &str) -> Option<String> {
        self.snapshot().get(&normalize_code(code)).cloned()
    }

    /// Swap in a freshly merged table built from `overlay`.
    pub fn reload(&self, overlay: &HashMap<String, String>, replace: bool) {
        let merged = merge_tables(&builtin_table(), overlay, replace);
        let count = merged.len();
        self.replace(merged);
        if replace {
            info!("languages: replaced table ({count} codes)");
        } else {
            info!("languages: overlaid {} codes ({count} total)", overlay.len());
        }
    }

    /// Swap in `table` wholesale.
    pub fn replace(&self, table: LanguageMap) {
        let table = Arc::new(table);
        // A poisoned lock still holds a complete table; keep serving it.
        let mut guard = self.table.write().unwrap_or_else(|e| e.into_inner());
        *guard = table;
    }

    /// Current table. Cheap: clones the `Arc`, not the map.
    pub fn snapshot(&self) -> Arc<LanguageMap> {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All entries sorted by code.
    pub fn sorted_entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .snapshot()
            .iter()
            .map(|(code, name)| (code.clone(), name.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::new(builtin_table())
    }
}
