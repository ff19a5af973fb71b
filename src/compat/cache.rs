//! Process-wide result cache with write-once-per-key semantics

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::compat::error::CacheError;
use crate::compat::types::{AnalysisResult, ApiEntity, PackageIdentity};

/// Memoizes analysis results keyed by (target platform, package identity,
/// optional API signature).
///
/// A key, once written, is never overwritten with a different value: `add`
/// is first-write-wins and concurrent writers racing on the same key are
/// safe. The map only grows, except through `clear` or a full snapshot
/// load. Constructed explicitly and passed by reference so tests can build
/// isolated instances.
pub struct ResultCache {
    entries: RwLock<HashMap<String, Arc<AnalysisResult>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache key for a package-level entry:
    /// `"{target}-{packageId}:{version}[:{sourceType}]"`
    pub fn package_key(target_platform: &str, identity: &PackageIdentity) -> String {
        format!("{}-{}", target_platform, identity)
    }

    /// Cache key for an API-level entry: the package key suffixed with
    /// `"-{originalSignature}"`
    pub fn api_key(target_platform: &str, identity: &PackageIdentity, api: &ApiEntity) -> String {
        format!(
            "{}-{}-{}",
            target_platform, identity, api.original_signature
        )
    }

    fn read_entries(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<AnalysisResult>>>, CacheError> {
        self.entries.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write_entries(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<AnalysisResult>>>, CacheError> {
        self.entries.write().map_err(|_| CacheError::LockPoisoned)
    }

    pub fn get(&self, key: &str) -> Option<Arc<AnalysisResult>> {
        self.read_entries().ok()?.get(key).cloned()
    }

    /// Insert a result unless the key already exists. Returns true when this
    /// call performed the write; a losing racer is a silent no-op.
    pub fn add(&self, key: &str, result: AnalysisResult) -> bool {
        let Ok(mut entries) = self.write_entries() else {
            return false;
        };

        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), Arc::new(result));
        true
    }

    pub fn exists(&self, key: &str) -> bool {
        self.read_entries()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.read_entries().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.write_entries() {
            debug!("Clearing {} cache entries", entries.len());
            entries.clear();
        }
    }

    /// Replace the entire cache with the contents of a serialized snapshot.
    ///
    /// Fails atomically: if the document does not parse as a flat
    /// key -> result map, the in-memory cache is left untouched. Returns
    /// the number of loaded entries.
    pub fn load_snapshot(&self, serialized: &str) -> Result<usize, CacheError> {
        let parsed: IndexMap<String, AnalysisResult> = serde_json::from_str(serialized)?;

        let mut entries = self.write_entries()?;
        entries.clear();
        for (key, result) in parsed {
            entries.insert(key, Arc::new(result));
        }

        info!("Loaded {} cache entries from snapshot", entries.len());
        Ok(entries.len())
    }

    /// Serialize the cache as a flat JSON object with sorted keys; None
    /// fields are omitted
    pub fn to_snapshot(&self) -> Result<String, CacheError> {
        let entries = self.read_entries()?;

        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();

        let snapshot: IndexMap<&str, &AnalysisResult> = keys
            .into_iter()
            .map(|key| (key.as_str(), entries[key].as_ref()))
            .collect();

        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    pub fn load_snapshot_file(&self, path: &Path) -> Result<usize, CacheError> {
        let serialized = std::fs::read_to_string(path)?;
        self.load_snapshot(&serialized)
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), CacheError> {
        let snapshot = self.to_snapshot()?;
        std::fs::write(path, snapshot)?;
        info!("Saved {} cache entries to {:?}", self.len(), path);
        Ok(())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
