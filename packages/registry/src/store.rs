// ABOUTME: JSON-file backed store of sandbox records
// ABOUTME: Whole-file atomic rewrite with per-entry corruption tolerance on read

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use warren_core::constants::{REGISTRY_FILE, SANDBOXES_DIR};

use crate::{
    CorruptEntry, RecordStatus, RegistryError, RegistrySnapshot, Result, SandboxRecord,
};

/// File-backed registry mapping sandbox names to their records.
///
/// The whole registry is one JSON object; every mutation rewrites it through
/// a temp file + rename so readers never observe a half-written file. All
/// mutation paths are expected to run under the project lock.
pub struct SandboxRegistry {
    registry_path: PathBuf,
}

impl SandboxRegistry {
    /// Open (creating the directory if needed) the registry of a project.
    pub fn open(project_root: &Path) -> Result<Self> {
        let dir = project_root.join(SANDBOXES_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            registry_path: dir.join(REGISTRY_FILE),
        })
    }

    /// Path of the backing file (for diagnostics).
    pub fn path(&self) -> &Path {
        &self.registry_path
    }

    fn load_raw(&self) -> Result<BTreeMap<String, Value>> {
        if !self.registry_path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.registry_path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save_raw(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.registry_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.registry_path)?;
        debug!(
            "Saved {} sandbox records to {}",
            entries.len(),
            self.registry_path.display()
        );
        Ok(())
    }

    /// Insert a new record. Fails with `AlreadyExists` when the name is
    /// taken; `put_overwrite` is the explicit repair-path escape hatch.
    pub fn put(&self, record: &SandboxRecord) -> Result<()> {
        let mut entries = self.load_raw()?;
        if entries.contains_key(&record.name) {
            return Err(RegistryError::AlreadyExists(record.name.clone()));
        }
        entries.insert(record.name.clone(), serde_json::to_value(record)?);
        self.save_raw(&entries)
    }

    /// Insert or replace a record unconditionally.
    pub fn put_overwrite(&self, record: &SandboxRecord) -> Result<()> {
        let mut entries = self.load_raw()?;
        entries.insert(record.name.clone(), serde_json::to_value(record)?);
        self.save_raw(&entries)
    }

    /// Fetch one record. A present-but-undecodable entry is an error, not
    /// an absence.
    pub fn get(&self, name: &str) -> Result<Option<SandboxRecord>> {
        let entries = self.load_raw()?;
        match entries.get(name) {
            None => Ok(None),
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(record) => Ok(Some(record)),
                Err(e) => Err(RegistryError::Corrupt {
                    name: name.to_string(),
                    detail: e.to_string(),
                }),
            },
        }
    }

    /// Update the stored lifecycle status of a sandbox.
    pub fn update_status(&self, name: &str, status: RecordStatus) -> Result<()> {
        let mut entries = self.load_raw()?;
        let Some(value) = entries.get(name) else {
            return Ok(());
        };
        let mut record: SandboxRecord =
            serde_json::from_value(value.clone()).map_err(|e| RegistryError::Corrupt {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        record.status = status;
        entries.insert(name.to_string(), serde_json::to_value(&record)?);
        self.save_raw(&entries)
    }

    /// Remove a record; returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut entries = self.load_raw()?;
        let existed = entries.remove(name).is_some();
        if existed {
            self.save_raw(&entries)?;
        }
        Ok(existed)
    }

    /// All entries, with corrupt ones reported separately instead of
    /// aborting the whole read.
    pub fn all(&self) -> Result<RegistrySnapshot> {
        let entries = self.load_raw()?;
        let mut snapshot = RegistrySnapshot::default();

        for (name, value) in entries {
            match serde_json::from_value::<SandboxRecord>(value) {
                Ok(record) => snapshot.records.push(record),
                Err(e) => {
                    warn!("Skipping corrupt registry entry '{}': {}", name, e);
                    snapshot.corrupt.push(CorruptEntry {
                        name,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> SandboxRecord {
        SandboxRecord {
            name: name.to_string(),
            branch: format!("sandbox/{}", name),
            worktree_path: PathBuf::from(format!("/tmp/project/.sandboxes/{}", name)),
            ports: BTreeMap::from([(3000, 8000)]),
            container_name: format!("warren-project-{}", name),
            container_id: Some("abc123".to_string()),
            status: RecordStatus::Running,
            created_at: Utc::now(),
        }
    }

    fn open_registry() -> (tempfile::TempDir, SandboxRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SandboxRegistry::open(tmp.path()).unwrap();
        (tmp, registry)
    }

    #[test]
    fn put_get_roundtrip() {
        let (_tmp, registry) = open_registry();
        let rec = record("alice");

        registry.put(&rec).unwrap();
        let loaded = registry.get("alice").unwrap().unwrap();

        assert_eq!(loaded.name, "alice");
        assert_eq!(loaded.branch, "sandbox/alice");
        assert_eq!(loaded.ports, BTreeMap::from([(3000, 8000)]));
        assert_eq!(loaded.status, RecordStatus::Running);
    }

    #[test]
    fn get_missing_is_none() {
        let (_tmp, registry) = open_registry();
        assert!(registry.get("ghost").unwrap().is_none());
    }

    #[test]
    fn duplicate_put_fails() {
        let (_tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();

        let err = registry.put(&record("alice")).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(name) if name == "alice"));
    }

    #[test]
    fn put_overwrite_replaces() {
        let (_tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();

        let mut updated = record("alice");
        updated.status = RecordStatus::Stopped;
        registry.put_overwrite(&updated).unwrap();

        let loaded = registry.get("alice").unwrap().unwrap();
        assert_eq!(loaded.status, RecordStatus::Stopped);
    }

    #[test]
    fn update_status_persists() {
        let (_tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();

        registry.update_status("alice", RecordStatus::Stopped).unwrap();

        let loaded = registry.get("alice").unwrap().unwrap();
        assert_eq!(loaded.status, RecordStatus::Stopped);
    }

    #[test]
    fn delete_reports_existence() {
        let (_tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();

        assert!(registry.delete("alice").unwrap());
        assert!(!registry.delete("alice").unwrap());
        assert!(registry.get("alice").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_skipped_and_reported_by_all() {
        let (tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();

        // Sabotage a second entry on disk: right shape, wrong types.
        let path = tmp.path().join(".sandboxes/registry.json");
        let mut raw: BTreeMap<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw.insert(
            "mallory".to_string(),
            serde_json::json!({ "name": "mallory", "ports": "not-a-map" }),
        );
        fs::write(&path, serde_json::to_string_pretty(&raw).unwrap()).unwrap();

        let snapshot = registry.all().unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].name, "alice");
        assert_eq!(snapshot.corrupt.len(), 1);
        assert_eq!(snapshot.corrupt[0].name, "mallory");
        assert_eq!(snapshot.len(), 2);

        // Name-addressed reads of the corrupt entry fail loudly.
        assert!(matches!(
            registry.get("mallory").unwrap_err(),
            RegistryError::Corrupt { .. }
        ));
    }

    #[test]
    fn empty_file_is_an_empty_registry() {
        let (tmp, registry) = open_registry();
        fs::write(tmp.path().join(".sandboxes/registry.json"), "").unwrap();
        assert!(registry.all().unwrap().is_empty());
    }

    #[test]
    fn rewrite_leaves_no_temp_file() {
        let (tmp, registry) = open_registry();
        registry.put(&record("alice")).unwrap();
        registry.put(&record("bob")).unwrap();

        assert!(!tmp.path().join(".sandboxes/registry.json.tmp").exists());
        assert_eq!(registry.all().unwrap().records.len(), 2);
    }
}
