//! In-memory dataset cache.
//!
//! Each dataset directory is loaded once per batch and shared by every run
//! over it through an `Arc<BarStore>`.

use replaylab_core::data::{BarStore, DataError, LoadOptions, LoadReport};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A loaded dataset and what the load reported.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub name: String,
    pub store: Arc<BarStore>,
    pub report: LoadReport,
    pub fingerprint: String,
}

/// Datasets keyed by name, loaded on first use.
#[derive(Debug, Default)]
pub struct DatasetCache {
    options: LoadOptions,
    entries: HashMap<String, LoadedDataset>,
}

impl DatasetCache {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached dataset, loading `dir` under `name` if needed.
    pub fn get_or_load(&mut self, name: &str, dir: &Path) -> Result<&LoadedDataset, DataError> {
        let slot = match self.entries.entry(name.to_string()) {
            Entry::Occupied(entry) => return Ok(entry.into_mut()),
            Entry::Vacant(slot) => slot,
        };

        let (store, report) = BarStore::load(dir, &self.options)?;
        let fingerprint = store.fingerprint();
        tracing::info!(
            dataset = name,
            symbols = store.len(),
            bars = store.total_bars(),
            skipped_files = report.skipped.len(),
            fingerprint = %fingerprint,
            "dataset cached"
        );
        Ok(slot.insert(LoadedDataset {
            name: name.to_string(),
            store: Arc::new(store),
            report,
            fingerprint,
        }))
    }

    /// Drops a dataset once no further runs need it.
    pub fn evict(&mut self, name: &str) -> Option<LoadedDataset> {
        self.entries.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_once_and_shares_the_store() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("X.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-02 10:00:00,1,2,1,1.5,10\n",
        )
        .unwrap();

        let mut cache = DatasetCache::new(LoadOptions::default());
        let first = Arc::clone(&cache.get_or_load("d", dir.path()).unwrap().store);
        // a second call must not hit the filesystem
        fs::remove_file(dir.path().join("X.csv")).unwrap();
        let second = Arc::clone(&cache.get_or_load("d", dir.path()).unwrap().store);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.evict("d").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut cache = DatasetCache::default();
        let err = cache
            .get_or_load("gone", Path::new("/no/such/dataset"))
            .unwrap_err();
        assert!(matches!(err, DataError::DirectoryNotFound { .. }));
    }
}
