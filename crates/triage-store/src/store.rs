//! Embedded persistence on top of `sled`. Five trees model the relational
//! schema from `original_source/db/models.py`:
//!
//! | Tree           | Key                              | Value              |
//! |----------------|-----------------------------------|--------------------|
//! | `publishers`   | `publisher_id`                    | `Publisher`        |
//! | `extensions`   | `extension_id\0version`           | `Extension`        |
//! | `scan_history` | `extension_db_id\0{u64 be bytes}` | `ScanHistoryRow`   |
//! | `blocklist`    | `extension_id`                    | `BlocklistEntry`   |
//!
//! `scan_history` is append-only: rows are never overwritten, keyed by a
//! sled-generated monotonic id so replay order matches insertion order.
//!
//! Grounded in `sentinel-registry::storage::Storage`.

use std::path::Path;

use triage_core::{BlocklistEntry, Extension, Publisher, ScanHistoryRow, ScanState};

use crate::error::{Result, StorageError};

const PUBLISHER_TREE: &str = "publishers";
const EXTENSION_TREE: &str = "extensions";
const HISTORY_TREE: &str = "scan_history";
const BLOCKLIST_TREE: &str = "blocklist";

#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    publishers: sled::Tree,
    extensions: sled::Tree,
    scan_history: sled::Tree,
    blocklist: sled::Tree,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store for tests; data is lost on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let publishers = db.open_tree(PUBLISHER_TREE)?;
        let extensions = db.open_tree(EXTENSION_TREE)?;
        let scan_history = db.open_tree(HISTORY_TREE)?;
        let blocklist = db.open_tree(BLOCKLIST_TREE)?;
        Ok(Self { db, publishers, extensions, scan_history, blocklist })
    }

    fn extension_key(extension_id: &str, version: &str) -> Vec<u8> {
        let mut key = extension_id.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(version.as_bytes());
        key
    }

    /// Inserts or updates an extension record. The package's vsix hash is
    /// immutable once recorded: if a later upsert tries to set a different
    /// non-null hash for the same `(extension_id, version)`, the write is
    /// rejected rather than silently overwriting it (spec.md invariant (d)
    /// is stricter here than the original's `COALESCE`-based upsert, which
    /// let a later null hash erase an earlier recorded one).
    pub fn upsert_extension(&self, mut ext: Extension) -> Result<Extension> {
        let key = Self::extension_key(&ext.extension_id, &ext.version);

        if let Some(existing) = self.get_raw(&key)? {
            if let (Some(old_hash), Some(new_hash)) = (&existing.vsix_hash_sha256, &ext.vsix_hash_sha256) {
                if old_hash != new_hash {
                    return Err(StorageError::HashMismatch { extension_id: ext.extension_id.clone() });
                }
            }
            if ext.vsix_hash_sha256.is_none() {
                ext.vsix_hash_sha256 = existing.vsix_hash_sha256.clone();
            }
        }

        let bytes = serde_json::to_vec(&ext)?;
        self.extensions.insert(key, bytes)?;
        Ok(ext)
    }

    pub fn get_extension(&self, extension_id: &str, version: &str) -> Result<Option<Extension>> {
        self.get_raw(&Self::extension_key(extension_id, version))
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Extension>> {
        match self.extensions.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lists every recorded version of an extension, in lexicographic
    /// version-string order.
    pub fn list_versions(&self, extension_id: &str) -> Result<Vec<Extension>> {
        let mut prefix = extension_id.as_bytes().to_vec();
        prefix.push(0);
        let mut out = Vec::new();
        for entry in self.extensions.scan_prefix(&prefix) {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    /// Validates and applies a scan-state transition (spec.md §3). Rejects
    /// the call outright if the transition isn't legal so a caller can't
    /// silently regress a package's state.
    pub fn update_scan_state(&self, extension_id: &str, version: &str, next: ScanState) -> Result<Extension> {
        let mut ext = self
            .get_extension(extension_id, version)?
            .ok_or_else(|| StorageError::NotFound(format!("{extension_id}@{version}")))?;

        if !ext.scan_state.can_transition_to(next) {
            return Err(StorageError::IllegalTransition {
                extension_id: extension_id.to_string(),
                from: ext.scan_state.to_string(),
                to: next.to_string(),
            });
        }

        ext.scan_state = next;
        ext.latest_state = next.latest_state();
        self.upsert_extension(ext)
    }

    pub fn upsert_publisher(&self, publisher: &Publisher) -> Result<()> {
        let bytes = serde_json::to_vec(publisher)?;
        self.publishers.insert(publisher.publisher_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_publisher(&self, publisher_id: &str) -> Result<Option<Publisher>> {
        match self.publishers.get(publisher_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Appends a scan-history row and returns its generated id. History is
    /// write-once: there is no update or delete path, matching the audit
    /// trail the original schema keeps.
    pub fn append_scan_history(&self, row: &ScanHistoryRow) -> Result<u64> {
        let id = self.db.generate_id()?;
        let mut key = row.extension_db_id.as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(&id.to_be_bytes());
        let bytes = serde_json::to_vec(row)?;
        self.scan_history.insert(key, bytes)?;
        Ok(id)
    }

    /// Lists scan-history rows for one extension in insertion order.
    pub fn list_scan_history(&self, extension_db_id: &str) -> Result<Vec<ScanHistoryRow>> {
        let mut prefix = extension_db_id.as_bytes().to_vec();
        prefix.push(0);
        let mut out = Vec::new();
        for entry in self.scan_history.scan_prefix(&prefix) {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    pub fn add_blocklist_entry(&self, entry: &BlocklistEntry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.blocklist.insert(entry.extension_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn is_blocklisted(&self, extension_id: &str) -> Result<bool> {
        Ok(self.blocklist.contains_key(extension_id.as_bytes())?)
    }

    pub fn get_blocklist_entry(&self, extension_id: &str) -> Result<Option<BlocklistEntry>> {
        match self.blocklist.get(extension_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("extensions_count", &self.extensions.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{BlocklistRemovalType, LatestState};

    fn make_extension(id: &str, version: &str) -> Extension {
        Extension {
            extension_id: id.to_string(),
            version: version.to_string(),
            display_name: Some("Test Extension".to_string()),
            vsix_hash_sha256: None,
            install_count: 0,
            average_rating: 0.0,
            publisher_id: None,
            scan_state: ScanState::Queued,
            latest_state: LatestState::Pending,
            risk_score: None,
        }
    }

    #[test]
    fn stores_and_loads_an_extension() {
        let store = Store::temporary().unwrap();
        store.upsert_extension(make_extension("acme.widgets", "1.0.0")).unwrap();
        let loaded = store.get_extension("acme.widgets", "1.0.0").unwrap().unwrap();
        assert_eq!(loaded.extension_id, "acme.widgets");
    }

    #[test]
    fn upsert_is_idempotent_for_matching_hashes() {
        let store = Store::temporary().unwrap();
        let mut ext = make_extension("acme.widgets", "1.0.0");
        ext.vsix_hash_sha256 = Some("deadbeef".to_string());
        store.upsert_extension(ext.clone()).unwrap();
        store.upsert_extension(ext).unwrap();
        let loaded = store.get_extension("acme.widgets", "1.0.0").unwrap().unwrap();
        assert_eq!(loaded.vsix_hash_sha256.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn upsert_rejects_conflicting_hash() {
        let store = Store::temporary().unwrap();
        let mut ext = make_extension("acme.widgets", "1.0.0");
        ext.vsix_hash_sha256 = Some("deadbeef".to_string());
        store.upsert_extension(ext.clone()).unwrap();

        ext.vsix_hash_sha256 = Some("cafebabe".to_string());
        let err = store.upsert_extension(ext).unwrap_err();
        assert!(matches!(err, StorageError::HashMismatch { .. }));
    }

    #[test]
    fn upsert_preserves_existing_hash_when_new_hash_is_absent() {
        let store = Store::temporary().unwrap();
        let mut ext = make_extension("acme.widgets", "1.0.0");
        ext.vsix_hash_sha256 = Some("deadbeef".to_string());
        store.upsert_extension(ext).unwrap();

        store.upsert_extension(make_extension("acme.widgets", "1.0.0")).unwrap();
        let loaded = store.get_extension("acme.widgets", "1.0.0").unwrap().unwrap();
        assert_eq!(loaded.vsix_hash_sha256.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn legal_scan_state_transition_succeeds() {
        let store = Store::temporary().unwrap();
        store.upsert_extension(make_extension("acme.widgets", "1.0.0")).unwrap();
        let updated = store.update_scan_state("acme.widgets", "1.0.0", ScanState::Downloading).unwrap();
        assert_eq!(updated.scan_state, ScanState::Downloading);
    }

    #[test]
    fn illegal_scan_state_transition_is_rejected() {
        let store = Store::temporary().unwrap();
        store.upsert_extension(make_extension("acme.widgets", "1.0.0")).unwrap();
        let err = store.update_scan_state("acme.widgets", "1.0.0", ScanState::Clean).unwrap_err();
        assert!(matches!(err, StorageError::IllegalTransition { .. }));
    }

    #[test]
    fn scan_history_is_append_only_and_ordered() {
        let store = Store::temporary().unwrap();
        for i in 0..3 {
            let row = ScanHistoryRow {
                extension_db_id: "acme.widgets@1.0.0".to_string(),
                scan_type: "static".to_string(),
                ai_vibe_score: 0.0,
                static_score: i as f64,
                behavioral_score: 0.0,
                trust_score: 0.0,
                composite_score: 0.0,
                risk_score: 0.0,
                findings_json: "[]".to_string(),
                raw_ai_response: None,
            };
            store.append_scan_history(&row).unwrap();
        }
        let rows = store.list_scan_history("acme.widgets@1.0.0").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].static_score, 0.0);
        assert_eq!(rows[2].static_score, 2.0);
    }

    #[test]
    fn blocklist_round_trips() {
        let store = Store::temporary().unwrap();
        assert!(!store.is_blocklisted("evil.publisher").unwrap());
        store
            .add_blocklist_entry(&BlocklistEntry {
                extension_id: "evil.publisher".to_string(),
                removal_date: "2026-01-01".to_string(),
                removal_type: BlocklistRemovalType::Malware,
            })
            .unwrap();
        assert!(store.is_blocklisted("evil.publisher").unwrap());
    }
}
