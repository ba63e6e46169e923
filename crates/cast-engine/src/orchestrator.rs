//! Orchestrator (component I): holds the cross-vault lock, drives pairwise
//! reconciliation for a chosen vault against every peer, writes files
//! atomically, refreshes indices, and updates sync-state stores.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::VaultConfig;
use crate::decision::{self, Decision, SkipReason, SyncPolicy};
use crate::error::{EngineError, Result};
use crate::frontmatter::{self, SyncManagedKey};
use crate::identity::DocId;
use crate::index;
use crate::lock;
use crate::merge;
use crate::sync_state::SyncStateStore;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// A single file-level action taken (or deliberately not taken) during a
/// reconciliation, drawn from the fixed label set in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLabel {
    CopyToVault1,
    CopyToVault2,
    AutoMergeVault1,
    AutoMergeVault2,
    Overpower,
    UseVault1,
    UseVault2,
    Conflict,
    Skip,
}

#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub doc_id: DocId,
    pub action: ActionLabel,
    pub relative_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct PeerResult {
    pub peer_id: String,
    pub synced: usize,
    pub conflicts: usize,
    pub errors: Vec<EngineError>,
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub peers: Vec<PeerResult>,
}

/// How the orchestrator should resolve a `Conflict` decision.
pub enum ConflictMode {
    /// Non-interactive: write `Conflict` markers at the destination and
    /// count the conflict (the CLI's only supported mode, §1/§2).
    NonInteractive,
    /// Interactive: an external collaborator resolves each conflict,
    /// behaving as the corresponding copy on `UseA`/`UseB`, or as `Skip`.
    Interactive(Box<dyn FnMut(&DocId, &str, &str) -> ConflictChoice>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    UseA,
    UseB,
    Skip,
}

/// Reconcile `driver_vault` against every peer vault in `peer_vaults`
/// (§4.I's nine steps).
pub fn sync_all(
    driver_vault: &Path,
    peer_vaults: &[PathBuf],
    overpower: bool,
    mut conflict_mode: ConflictMode,
    policy: SyncPolicy,
) -> Result<SyncReport> {
    let driver_config = VaultConfig::load(driver_vault)?;
    let driver_cast_dir = driver_vault.join(".cast");

    let mut peer_configs = Vec::new();
    for peer_path in peer_vaults {
        match VaultConfig::load(peer_path) {
            Ok(config) => peer_configs.push((peer_path.clone(), config)),
            Err(e) => {
                warn!(peer = %peer_path.display(), error = %e, "skipping peer with unloadable config");
            }
        }
    }

    let driver_build = index::build_index(driver_vault, &driver_config, false, true)?;
    let mut driver_index = driver_build.index;

    let lock = lock::acquire(&driver_cast_dir, LOCK_TIMEOUT)?;
    info!(path = %lock.path().display(), "acquired sync lock");

    let mut report = SyncReport::default();
    let mut driver_sync_state = SyncStateStore::load(driver_vault)?;
    let mut all_active_ids: HashSet<DocId> = driver_index.ids().copied().collect();

    for (peer_path, peer_config) in &peer_configs {
        let mut peer_result = PeerResult {
            peer_id: peer_config.vault_id.clone(),
            ..Default::default()
        };
        peer_result.errors.extend(driver_build.errors.iter().map(clone_error));

        let peer_build = index::build_index(peer_path, peer_config, false, true)?;
        let mut peer_index = peer_build.index;
        peer_result.errors.extend(peer_build.errors.into_iter());

        let mut peer_sync_state = SyncStateStore::load(peer_path)?;

        let mut ids: Vec<DocId> = driver_index
            .ids()
            .chain(peer_index.ids())
            .copied()
            .collect();
        ids.sort();
        ids.dedup();

        for id in ids {
            let e1 = driver_index.lookup_by_id(&id).cloned();
            let e2 = peer_index.lookup_by_id(&id).cloned();
            let b1 = driver_sync_state.get(&peer_config.vault_id, &id).map(str::to_string);
            let b2 = peer_sync_state.get(&driver_config.vault_id, &id).map(str::to_string);

            let decision = decision::decide(
                &id,
                e1.as_ref(),
                e2.as_ref(),
                b1.as_deref(),
                b2.as_deref(),
                overpower,
                &driver_config.vault_id,
                &peer_config.vault_id,
                policy,
            );

            match apply_decision(
                &id,
                decision,
                driver_vault,
                peer_path,
                e1.as_ref(),
                e2.as_ref(),
                &mut conflict_mode,
            ) {
                Ok(Some(outcome)) => {
                    peer_result.actions.push(ActionRecord {
                        doc_id: id,
                        action: outcome.label,
                        relative_path: outcome.relative_path.clone(),
                    });

                    if outcome.is_conflict {
                        peer_result.conflicts += 1;
                    } else if outcome.advances_baseline {
                        peer_result.synced += 1;
                        if let Some(digest) = outcome.resulting_digest {
                            driver_sync_state.put(&peer_config.vault_id, id, digest.clone());
                            peer_sync_state.put(&driver_config.vault_id, id, digest);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    peer_result.errors.push(e);
                }
            }
        }

        // Step 7: re-run incremental index on both vaults to pick up fresh digests.
        let refreshed_driver = index::build_index(driver_vault, &driver_config, false, true)?;
        driver_index = refreshed_driver.index;
        let refreshed_peer = index::build_index(peer_path, peer_config, false, true)?;
        peer_index = refreshed_peer.index;

        peer_sync_state.save_atomic(peer_path)?;
        all_active_ids.extend(driver_index.ids().copied());
        all_active_ids.extend(peer_index.ids().copied());

        report.peers.push(peer_result);
    }

    driver_sync_state.prune(&all_active_ids);
    driver_sync_state.save_atomic(driver_vault)?;

    drop(lock);
    Ok(report)
}

struct ApplyOutcome {
    label: ActionLabel,
    relative_path: PathBuf,
    is_conflict: bool,
    advances_baseline: bool,
    resulting_digest: Option<String>,
}

fn apply_decision(
    id: &DocId,
    decision: Decision,
    driver_vault: &Path,
    peer_vault: &Path,
    e1: Option<&index::IndexEntry>,
    e2: Option<&index::IndexEntry>,
    conflict_mode: &mut ConflictMode,
) -> Result<Option<ApplyOutcome>> {
    match decision {
        Decision::Skip(_) => Ok(None),
        Decision::CopyAtoB => {
            let entry = e1.expect("CopyAtoB implies driver entry present");
            copy_preserving_local_fields(driver_vault, peer_vault, &entry.path)?;
            Ok(Some(ApplyOutcome {
                label: ActionLabel::CopyToVault2,
                relative_path: entry.path.clone(),
                is_conflict: false,
                advances_baseline: true,
                resulting_digest: Some(entry.digest.clone()),
            }))
        }
        Decision::CopyBtoA => {
            let entry = e2.expect("CopyBtoA implies peer entry present");
            copy_preserving_local_fields(peer_vault, driver_vault, &entry.path)?;
            Ok(Some(ApplyOutcome {
                label: ActionLabel::CopyToVault1,
                relative_path: entry.path.clone(),
                is_conflict: false,
                advances_baseline: true,
                resulting_digest: Some(entry.digest.clone()),
            }))
        }
        Decision::AutoUseA => {
            let entry = e1.expect("AutoUseA implies driver entry present");
            copy_preserving_local_fields(driver_vault, peer_vault, &entry.path)?;
            Ok(Some(ApplyOutcome {
                label: ActionLabel::AutoMergeVault1,
                relative_path: entry.path.clone(),
                is_conflict: false,
                advances_baseline: true,
                resulting_digest: Some(entry.digest.clone()),
            }))
        }
        Decision::AutoUseB => {
            let entry = e2.expect("AutoUseB implies peer entry present");
            copy_preserving_local_fields(peer_vault, driver_vault, &entry.path)?;
            Ok(Some(ApplyOutcome {
                label: ActionLabel::AutoMergeVault2,
                relative_path: entry.path.clone(),
                is_conflict: false,
                advances_baseline: true,
                resulting_digest: Some(entry.digest.clone()),
            }))
        }
        Decision::Overpower => {
            let entry = e1.expect("Overpower implies driver entry present");
            copy_preserving_local_fields(driver_vault, peer_vault, &entry.path)?;
            Ok(Some(ApplyOutcome {
                label: ActionLabel::Overpower,
                relative_path: entry.path.clone(),
                is_conflict: false,
                advances_baseline: true,
                resulting_digest: Some(entry.digest.clone()),
            }))
        }
        Decision::Conflict => {
            let e1 = e1.expect("Conflict implies both entries present");
            let e2 = e2.expect("Conflict implies both entries present");

            match conflict_mode {
                ConflictMode::NonInteractive => {
                    write_conflict_markers(driver_vault, peer_vault, e1, e2)?;
                    Ok(Some(ApplyOutcome {
                        label: ActionLabel::Conflict,
                        relative_path: e1.path.clone(),
                        is_conflict: true,
                        advances_baseline: false,
                        resulting_digest: None,
                    }))
                }
                ConflictMode::Interactive(resolve) => {
                    let a_path = driver_vault.join(&e1.path);
                    let b_path = peer_vault.join(&e2.path);
                    let a_body = std::fs::read_to_string(&a_path)?;
                    let b_body = std::fs::read_to_string(&b_path)?;
                    match resolve(id, &a_body, &b_body) {
                        ConflictChoice::UseA => {
                            copy_preserving_local_fields(driver_vault, peer_vault, &e1.path)?;
                            Ok(Some(ApplyOutcome {
                                label: ActionLabel::UseVault1,
                                relative_path: e1.path.clone(),
                                is_conflict: false,
                                advances_baseline: true,
                                resulting_digest: Some(e1.digest.clone()),
                            }))
                        }
                        ConflictChoice::UseB => {
                            copy_preserving_local_fields(peer_vault, driver_vault, &e2.path)?;
                            Ok(Some(ApplyOutcome {
                                label: ActionLabel::UseVault2,
                                relative_path: e2.path.clone(),
                                is_conflict: false,
                                advances_baseline: true,
                                resulting_digest: Some(e2.digest.clone()),
                            }))
                        }
                        ConflictChoice::Skip => Ok(Some(ApplyOutcome {
                            label: ActionLabel::Skip,
                            relative_path: e1.path.clone(),
                            is_conflict: true,
                            advances_baseline: false,
                            resulting_digest: None,
                        })),
                    }
                }
            }
        }
    }
}

/// Copy `src_vault/rel_path` to `dst_vault/rel_path` atomically. The
/// destination's own local frontmatter keys are preserved: sync-managed
/// keys are overwritten from the source, local keys are kept from whatever
/// the destination already had (§4.I step 6, §4.H step 5).
fn copy_preserving_local_fields(src_vault: &Path, dst_vault: &Path, rel_path: &Path) -> Result<()> {
    let src_path = src_vault.join(rel_path);
    let dst_path = dst_vault.join(rel_path);

    let src_content = std::fs::read_to_string(&src_path)?;
    let src_doc = frontmatter::parse(&src_content).map_err(|reason| EngineError::MalformedFrontmatter {
        path: src_path.clone(),
        reason,
    })?;

    if !dst_path.exists() {
        return crate::atomic::copy_atomic(&src_path, &dst_path);
    }

    let dst_content = std::fs::read_to_string(&dst_path)?;
    let dst_doc = frontmatter::parse(&dst_content).map_err(|reason| EngineError::MalformedFrontmatter {
        path: dst_path.clone(),
        reason,
    })?;

    let merged = merge_frontmatter(src_doc, dst_doc);
    let rewritten = frontmatter::serialize(&merged);
    crate::atomic::write_atomic(&dst_path, rewritten.as_bytes())
}

/// Take the source's body and sync-managed keys, the destination's local
/// keys.
fn merge_frontmatter(
    src_doc: frontmatter::Document,
    dst_doc: frontmatter::Document,
) -> frontmatter::Document {
    let mut result_fm = frontmatter::Frontmatter::default();

    for key in dst_doc.frontmatter.keys() {
        if SyncManagedKey::classify(key).is_none() {
            if let Some(value) = dst_doc.frontmatter.get(key) {
                result_fm.set(key, value.clone());
            }
        }
    }
    for key in src_doc.frontmatter.keys() {
        if SyncManagedKey::classify(key).is_some() {
            if let Some(value) = src_doc.frontmatter.get(key) {
                result_fm.set(key, value.clone());
            }
        }
    }
    result_fm.reorder_canonically();

    frontmatter::Document {
        frontmatter: result_fm,
        body: src_doc.body,
        had_frontmatter: true,
    }
}

/// Materialize a Conflict outcome at the destination (V2/peer) path per
/// §4.H: source body and dest body aligned via LCS, destination's local
/// frontmatter kept, sync-managed keys from the source.
fn write_conflict_markers(
    driver_vault: &Path,
    peer_vault: &Path,
    e1: &index::IndexEntry,
    e2: &index::IndexEntry,
) -> Result<()> {
    let a_path = driver_vault.join(&e1.path);
    let b_path = peer_vault.join(&e2.path);

    let a_content = std::fs::read_to_string(&a_path)?;
    let b_content = std::fs::read_to_string(&b_path)?;

    let a_doc = frontmatter::parse(&a_content).map_err(|reason| EngineError::MalformedFrontmatter {
        path: a_path.clone(),
        reason,
    })?;
    let b_doc = frontmatter::parse(&b_content).map_err(|reason| EngineError::MalformedFrontmatter {
        path: b_path.clone(),
        reason,
    })?;

    let a_body = crate::normalize::canonicalize(&a_doc.body);
    let b_body = crate::normalize::canonicalize(&b_doc.body);
    let merged_body = merge::merge_two(&a_body, &b_body);
    if merged_body.conflict_count == 0 {
        return Ok(());
    }

    let merged_doc = merge_frontmatter(
        frontmatter::Document {
            frontmatter: a_doc.frontmatter,
            body: merged_body.text,
            had_frontmatter: true,
        },
        b_doc,
    );

    let rewritten = frontmatter::serialize(&merged_doc);
    crate::atomic::write_atomic(&b_path, rewritten.as_bytes())
}

fn clone_error(e: &EngineError) -> EngineError {
    match e {
        EngineError::MalformedFrontmatter { path, reason } => EngineError::MalformedFrontmatter {
            path: path.clone(),
            reason: reason.clone(),
        },
        EngineError::DuplicateIdentifier { doc_id, paths } => EngineError::DuplicateIdentifier {
            doc_id: *doc_id,
            paths: paths.clone(),
        },
        EngineError::WriteFailure { path, reason } => EngineError::WriteFailure {
            path: path.clone(),
            reason: reason.clone(),
        },
        EngineError::MergeUnresolved { path } => EngineError::MergeUnresolved { path: path.clone() },
        EngineError::ConfigError { path, reason } => EngineError::ConfigError {
            path: path.clone(),
            reason: reason.clone(),
        },
        EngineError::LockBusy { path, timeout_secs } => EngineError::LockBusy {
            path: path.clone(),
            timeout_secs: *timeout_secs,
        },
        EngineError::Io(e) => EngineError::Io(std::io::Error::new(e.kind(), e.to_string())),
        EngineError::Yaml(_) => EngineError::ConfigError {
            path: PathBuf::new(),
            reason: e.to_string(),
        },
        EngineError::Json(_) => EngineError::ConfigError {
            path: PathBuf::new(),
            reason: e.to_string(),
        },
    }
}

/// Delete `index.json`, `sync_state.json`, and any legacy subdirectories
/// under `.cast/`, optionally keeping `config.yaml`.
pub fn reset(vault_root: &Path, keep_config: bool) -> Result<()> {
    let cast_dir = vault_root.join(".cast");
    if !cast_dir.exists() {
        return Ok(());
    }

    for entry in std::fs::read_dir(&cast_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if keep_config && name == "config.yaml" {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn init_vault(dir: &Path, id: &str) {
        let config = VaultConfig::create_default(dir, Some(id.to_string()));
        config.save().unwrap();
    }

    #[test]
    fn create_scenario_copies_new_file_to_peer() {
        let v1 = TempDir::new().unwrap();
        let v2 = TempDir::new().unwrap();
        init_vault(v1.path(), "v1");
        init_vault(v2.path(), "v2");

        write_file(
            v1.path(),
            "note.md",
            "---\ncast-type: Note\ncast-vaults:\n  - v1 (cast)\n  - v2 (sync)\n---\nhello\n",
        );

        let report = sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            false,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.peers.len(), 1);
        assert_eq!(report.peers[0].synced, 1);
        assert!(v2.path().join("note.md").exists());
    }

    #[test]
    fn conflict_scenario_writes_markers_non_interactively() {
        let v1 = TempDir::new().unwrap();
        let v2 = TempDir::new().unwrap();
        init_vault(v1.path(), "v1");
        init_vault(v2.path(), "v2");

        let shared_id = "22222222-2222-2222-2222-222222222222";
        let fm = format!(
            "cast-id: {shared_id}\ncast-type: Note\ncast-vaults:\n  - v1 (cast)\n  - v2 (sync)\n"
        );
        write_file(v1.path(), "note.md", &format!("---\n{fm}---\nv1 edit\n"));
        write_file(v2.path(), "note.md", &format!("---\n{fm}---\nv2 edit\n"));

        let report = sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            false,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.peers[0].conflicts, 1);
        let result = std::fs::read_to_string(v2.path().join("note.md")).unwrap();
        assert!(result.contains("<<<<<<< SOURCE"));
        assert!(result.contains(">>>>>>> DESTINATION"));
    }

    #[test]
    fn overpower_forces_driver_version() {
        let v1 = TempDir::new().unwrap();
        let v2 = TempDir::new().unwrap();
        init_vault(v1.path(), "v1");
        init_vault(v2.path(), "v2");

        let shared_id = "33333333-3333-3333-3333-333333333333";
        let fm = format!(
            "cast-id: {shared_id}\ncast-type: Note\ncast-vaults:\n  - v1 (cast)\n  - v2 (sync)\n"
        );
        write_file(v1.path(), "note.md", &format!("---\n{fm}---\nv1 edit\n"));
        write_file(v2.path(), "note.md", &format!("---\n{fm}---\nv2 edit\n"));

        let report = sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            true,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.peers[0].synced, 1);
        assert_eq!(report.peers[0].conflicts, 0);
        let result = std::fs::read_to_string(v2.path().join("note.md")).unwrap();
        assert!(result.contains("v1 edit"));
        assert!(!result.contains("v2 edit"));
        assert!(result.starts_with("---\ncast-id:"));
    }

    #[test]
    fn membership_filter_skips_non_participant_file() {
        let v1 = TempDir::new().unwrap();
        let v2 = TempDir::new().unwrap();
        init_vault(v1.path(), "v1");
        init_vault(v2.path(), "v2");

        write_file(
            v1.path(),
            "private.md",
            "---\ncast-type: Note\ncast-vaults:\n  - v1 (cast)\n  - other (sync)\n---\nhello\n",
        );

        let report = sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            false,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.peers[0].synced, 0);
        assert!(!v2.path().join("private.md").exists());
    }

    #[test]
    fn local_fields_are_preserved_across_a_copy() {
        let v1 = TempDir::new().unwrap();
        let v2 = TempDir::new().unwrap();
        init_vault(v1.path(), "v1");
        init_vault(v2.path(), "v2");

        let shared_id = "44444444-4444-4444-4444-444444444444";
        let fm_common =
            format!("cast-id: {shared_id}\ncast-type: Note\ncast-vaults:\n  - v1 (cast)\n  - v2 (sync)\n");
        write_file(v1.path(), "note.md", &format!("---\n{fm_common}---\noriginal body\n"));
        write_file(
            v2.path(),
            "note.md",
            &format!("---\n{fm_common}category: personal\n---\noriginal body\n"),
        );

        // First pass establishes agreed baselines for both sides.
        sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            false,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        // v1 edits the body; v2 has not diverged since the agreed baseline.
        write_file(v1.path(), "note.md", &format!("---\n{fm_common}---\nupdated body\n"));

        let report = sync_all(
            v1.path(),
            &[v2.path().to_path_buf()],
            false,
            ConflictMode::NonInteractive,
            SyncPolicy::default(),
        )
        .unwrap();

        assert_eq!(report.peers[0].synced, 1);
        assert_eq!(report.peers[0].conflicts, 0);

        let result = std::fs::read_to_string(v2.path().join("note.md")).unwrap();
        assert!(result.contains("category: personal"));
        assert!(result.contains("updated body"));
    }

    #[test]
    fn reset_removes_index_and_sync_state_but_keeps_config() {
        let dir = TempDir::new().unwrap();
        init_vault(dir.path(), "v1");
        write_file(dir.path(), ".cast/index.json", "{}");
        write_file(dir.path(), ".cast/sync_state.json", "{}");

        reset(dir.path(), true).unwrap();

        assert!(!dir.path().join(".cast/index.json").exists());
        assert!(!dir.path().join(".cast/sync_state.json").exists());
        assert!(dir.path().join(".cast/config.yaml").exists());
    }
}
