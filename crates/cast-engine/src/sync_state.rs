//! Sync-state store (component F): per-peer last-agreed digest baselines.
//! The sole baseline mechanism — there is no separate historical archive.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::identity::DocId;

/// `{ peer_id: { doc_id: digest } }`, persisted at
/// `<vault>/.cast/sync_state.json`.
#[derive(Debug, Clone, Default)]
pub struct SyncStateStore {
    state: HashMap<String, HashMap<DocId, String>>,
}

impl SyncStateStore {
    pub fn state_path(vault_root: &Path) -> PathBuf {
        vault_root.join(".cast").join("sync_state.json")
    }

    pub fn load(vault_root: &Path) -> Result<Self> {
        let path = Self::state_path(vault_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let state: HashMap<String, HashMap<DocId, String>> = serde_json::from_str(&contents)?;
        Ok(Self { state })
    }

    pub fn save_atomic(&self, vault_root: &Path) -> Result<()> {
        let path = Self::state_path(vault_root);
        let json = serde_json::to_string_pretty(&self.state)?;
        crate::atomic::write_atomic(&path, json.as_bytes())
    }

    /// Last digest agreed with `peer` for `doc`, if any.
    pub fn get(&self, peer: &str, doc: &DocId) -> Option<&str> {
        self.state.get(peer)?.get(doc).map(|s| s.as_str())
    }

    /// Record the digest agreed with `peer` for `doc` after a successful
    /// reconciliation.
    pub fn put(&mut self, peer: &str, doc: DocId, digest: String) {
        self.state.entry(peer.to_string()).or_default().insert(doc, digest);
    }

    /// Remove baselines for DocIds no longer present in the vault's index,
    /// across every peer. Invoked opportunistically by the orchestrator at
    /// the end of a successful run for the driver vault.
    pub fn prune(&mut self, active_ids: &HashSet<DocId>) {
        for peer_entries in self.state.values_mut() {
            peer_entries.retain(|id, _| active_ids.contains(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn get_is_none_for_unknown_peer_or_doc() {
        let store = SyncStateStore::default();
        let id = DocId::generate();
        assert_eq!(store.get("peer-a", &id), None);
    }

    #[test]
    fn put_then_get_roundtrips() {
        let mut store = SyncStateStore::default();
        let id = DocId::generate();
        store.put("peer-a", id, "sha256:abc".to_string());
        assert_eq!(store.get("peer-a", &id), Some("sha256:abc"));
    }

    #[test]
    fn peers_are_kept_independent() {
        let mut store = SyncStateStore::default();
        let id = DocId::generate();
        store.put("peer-a", id, "sha256:aaa".to_string());
        store.put("peer-b", id, "sha256:bbb".to_string());
        assert_eq!(store.get("peer-a", &id), Some("sha256:aaa"));
        assert_eq!(store.get("peer-b", &id), Some("sha256:bbb"));
    }

    #[test]
    fn save_and_load_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = SyncStateStore::default();
        let id = DocId::generate();
        store.put("peer-a", id, "sha256:abc".to_string());
        store.save_atomic(dir.path()).unwrap();

        let loaded = SyncStateStore::load(dir.path()).unwrap();
        assert_eq!(loaded.get("peer-a", &id), Some("sha256:abc"));
    }

    #[test]
    fn prune_drops_entries_for_inactive_ids() {
        let mut store = SyncStateStore::default();
        let kept = DocId::generate();
        let dropped = DocId::generate();
        store.put("peer-a", kept, "sha256:aaa".to_string());
        store.put("peer-a", dropped, "sha256:bbb".to_string());

        let mut active = HashSet::new();
        active.insert(kept);
        store.prune(&active);

        assert_eq!(store.get("peer-a", &kept), Some("sha256:aaa"));
        assert_eq!(store.get("peer-a", &dropped), None);
    }
}
