//! Index (component E): persistent mapping DocId -> (path, digest,
//! membership, size, mtime, cast-type/cast-version passthroughs).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::error::{EngineError, Result};
use crate::frontmatter::{self, FrontmatterValue};
use crate::identity::{self, DocId, EnsureOutcome};
use crate::normalize;
use crate::selector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub digest: String,
    #[serde(default)]
    pub membership: Vec<String>,
    pub size: u64,
    pub mtime: i64,
    #[serde(default)]
    pub cast_type: String,
    #[serde(default)]
    pub cast_version: String,
}

/// The vault's persistent index: one [`IndexEntry`] per participating
/// document, keyed by [`DocId`].
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: BTreeMap<DocId, IndexEntry>,
}

impl Index {
    pub fn index_path(vault_root: &Path) -> PathBuf {
        vault_root.join(".cast").join("index.json")
    }

    pub fn load(vault_root: &Path) -> Result<Self> {
        let path = Self::index_path(vault_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let raw: BTreeMap<DocId, IndexEntry> = serde_json::from_str(&contents)?;
        Ok(Self { entries: raw })
    }

    pub fn save_atomic(&self, vault_root: &Path) -> Result<()> {
        let path = Self::index_path(vault_root);
        let json = serde_json::to_string_pretty(&self.entries)?;
        crate::atomic::write_atomic(&path, json.as_bytes())
    }

    pub fn lookup_by_id(&self, id: &DocId) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn lookup_by_path(&self, path: &Path) -> Option<(DocId, &IndexEntry)> {
        self.entries
            .iter()
            .find(|(_, e)| e.path == path)
            .map(|(id, e)| (*id, e))
    }

    pub fn upsert(&mut self, id: DocId, entry: IndexEntry) {
        self.entries.insert(id, entry);
    }

    pub fn delete(&mut self, id: &DocId) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocId, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn membership_list(value: Option<&FrontmatterValue>) -> Vec<String> {
    match value {
        Some(FrontmatterValue::Sequence(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        Some(FrontmatterValue::Scalar(v)) => v.as_str().map(|s| vec![s.to_string()]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn opaque_string(value: Option<&FrontmatterValue>) -> String {
    value.and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn stat_fingerprint(path: &Path) -> Result<(u64, i64)> {
    let meta = std::fs::metadata(path)?;
    let size = meta.len();
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok((size, mtime))
}

/// Index a single file: parse frontmatter, run the identity service, compute
/// the body digest, and build its [`IndexEntry`]. Returns `None` when the
/// file is not (or is no longer, per `auto_fix = false`) a sync participant.
fn index_file(
    vault_root: &Path,
    rel_path: &Path,
    auto_fix: bool,
) -> Result<Option<(DocId, IndexEntry)>> {
    let abs_path = vault_root.join(rel_path);
    let content = std::fs::read_to_string(&abs_path)?;

    let mut document = frontmatter::parse(&content).map_err(|reason| {
        EngineError::MalformedFrontmatter {
            path: abs_path.clone(),
            reason,
        }
    })?;

    let outcome = identity::ensure_present(&mut document, auto_fix);
    let id = match outcome {
        EnsureOutcome::AlreadyPresent(id) => id,
        EnsureOutcome::Reordered(id) | EnsureOutcome::Generated(id) => {
            let rewritten = frontmatter::serialize(&document);
            crate::atomic::write_atomic(&abs_path, rewritten.as_bytes())?;
            id
        }
        EnsureOutcome::SkippedNoAutoFix | EnsureOutcome::NotAParticipant => return Ok(None),
    };

    let digest = normalize::digest(&document.body);
    let (size, mtime) = stat_fingerprint(&abs_path)?;

    let entry = IndexEntry {
        path: rel_path.to_path_buf(),
        digest,
        membership: membership_list(document.frontmatter.get("cast-vaults")),
        size,
        mtime,
        cast_type: opaque_string(document.frontmatter.get("cast-type")),
        cast_version: opaque_string(document.frontmatter.get("cast-version")),
    };

    Ok(Some((id, entry)))
}

/// Result of [`build_index`]: the rebuilt index plus any non-fatal, per-id
/// errors encountered along the way (§7: `DuplicateIdentifier` is per-id,
/// not fatal to the whole build).
#[derive(Debug)]
pub struct IndexBuildReport {
    pub index: Index,
    pub errors: Vec<EngineError>,
}

/// Build or incrementally update a vault's index (§4.E).
///
/// 1. Load the prior index unless `rebuild`.
/// 2. Enumerate files via the selector.
/// 3. Reuse a prior entry when `(path, size, mtime)` still matches; else
///    re-index the file.
/// 4. Delete entries whose files were not seen this pass.
/// 5. Save atomically.
///
/// Two files sharing a DocId within this vault is reported as
/// `DuplicateIdentifier` and that DocId is excluded from the saved index
/// entirely rather than failing the whole build.
pub fn build_index(
    vault_root: &Path,
    config: &VaultConfig,
    rebuild: bool,
    auto_fix: bool,
) -> Result<IndexBuildReport> {
    let mut index = if rebuild {
        Index::default()
    } else {
        Index::load(vault_root)?
    };

    let files = selector::select_files(vault_root, &config.include_patterns, &config.exclude_patterns);

    let mut seen = std::collections::HashSet::new();
    let mut errors = Vec::new();
    let mut claims: std::collections::HashMap<DocId, Vec<PathBuf>> = std::collections::HashMap::new();

    for rel_path in &files {
        if rel_path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        if !rebuild {
            if let Some((id, entry)) = index.lookup_by_path(rel_path) {
                let abs_path = vault_root.join(rel_path);
                if let Ok((size, mtime)) = stat_fingerprint(&abs_path) {
                    if entry.size == size && entry.mtime == mtime {
                        seen.insert(id);
                        claims.entry(id).or_default().push(rel_path.clone());
                        continue;
                    }
                }
            }
        }

        match index_file(vault_root, rel_path, auto_fix) {
            Ok(Some((id, entry))) => {
                seen.insert(id);
                claims.entry(id).or_default().push(rel_path.clone());
                index.upsert(id, entry);
            }
            Ok(None) => {}
            Err(EngineError::MalformedFrontmatter { path, reason }) => {
                errors.push(EngineError::MalformedFrontmatter { path, reason });
            }
            Err(other) => return Err(other),
        }
    }

    for (id, paths) in claims.iter() {
        if paths.len() > 1 {
            errors.push(EngineError::DuplicateIdentifier {
                doc_id: *id,
                paths: paths.clone(),
            });
            index.delete(id);
            seen.remove(id);
        }
    }

    let stale: Vec<DocId> = index
        .ids()
        .filter(|id| !seen.contains(*id))
        .copied()
        .collect();
    for id in stale {
        index.delete(&id);
    }

    index.save_atomic(vault_root)?;
    Ok(IndexBuildReport { index, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn build_index_assigns_ids_and_persists() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\ncast-type: Note\n---\nhello\n");
        let config = VaultConfig::create_default(dir.path(), None);

        let report = build_index(dir.path(), &config, true, true).unwrap();
        assert_eq!(report.index.len(), 1);
        assert!(report.errors.is_empty());
        assert!(Index::index_path(dir.path()).exists());

        let reloaded = Index::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn build_index_skips_files_without_sync_managed_keys() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\ntitle: Just local\n---\nhello\n");
        let config = VaultConfig::create_default(dir.path(), None);

        let report = build_index(dir.path(), &config, true, true).unwrap();
        assert!(report.index.is_empty());
    }

    #[test]
    fn incremental_rebuild_reuses_unchanged_entries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\ncast-type: Note\n---\nhello\n");
        let config = VaultConfig::create_default(dir.path(), None);

        let first = build_index(dir.path(), &config, true, true).unwrap();
        let (id, entry) = first.index.iter().next().unwrap();
        let original_digest = entry.digest.clone();

        let second = build_index(dir.path(), &config, false, true).unwrap();
        assert_eq!(second.index.lookup_by_id(id).unwrap().digest, original_digest);
    }

    #[test]
    fn deleted_files_are_removed_from_index() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", "---\ncast-type: Note\n---\nhello\n");
        let config = VaultConfig::create_default(dir.path(), None);

        build_index(dir.path(), &config, true, true).unwrap();
        std::fs::remove_file(dir.path().join("a.md")).unwrap();

        let after = build_index(dir.path(), &config, false, true).unwrap();
        assert!(after.index.is_empty());
    }

    #[test]
    fn membership_list_is_captured_from_cast_vaults() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.md",
            "---\ncast-type: Note\ncast-vaults:\n  - work (cast)\n  - laptop (sync)\n---\nhello\n",
        );
        let config = VaultConfig::create_default(dir.path(), None);

        let report = build_index(dir.path(), &config, true, true).unwrap();
        let (_, entry) = report.index.iter().next().unwrap();
        assert_eq!(entry.membership, vec!["work (cast)", "laptop (sync)"]);
    }

    #[test]
    fn duplicate_cast_id_across_two_files_is_reported_and_excluded() {
        let dir = TempDir::new().unwrap();
        let shared_id = "11111111-1111-1111-1111-111111111111";
        write(
            dir.path(),
            "a.md",
            &format!("---\ncast-id: {shared_id}\ncast-type: Note\n---\nhello\n"),
        );
        write(
            dir.path(),
            "b.md",
            &format!("---\ncast-id: {shared_id}\ncast-type: Note\n---\nworld\n"),
        );
        let config = VaultConfig::create_default(dir.path(), None);

        let report = build_index(dir.path(), &config, true, true).unwrap();
        assert!(report.index.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0],
            EngineError::DuplicateIdentifier { .. }
        ));
    }
}
