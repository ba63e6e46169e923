//! Vault configuration: `.cast/config.yaml` (§6 External Interfaces).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const SUPPORTED_CAST_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultSection {
    id: String,
    #[serde(default)]
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexSection {
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MergeSection {
    #[serde(default)]
    ephemeral_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
    #[serde(rename = "cast-version", default = "default_cast_version")]
    cast_version: String,
    vault: VaultSection,
    #[serde(default)]
    index: Option<IndexSection>,
    #[serde(default)]
    merge: Option<MergeSection>,
}

fn default_cast_version() -> String {
    SUPPORTED_CAST_VERSION.to_string()
}

fn default_ephemeral_keys() -> Vec<String> {
    vec![
        "updated".to_string(),
        "last_synced".to_string(),
        "base-version".to_string(),
    ]
}

/// Per-vault configuration, loaded from `<vault_root>/.cast/config.yaml`.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub cast_version: String,
    pub vault_id: String,
    pub vault_root: PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Carried for round-trip fidelity with the original config format; not
    /// consulted by the digest path (§4.C digests the body only).
    pub ephemeral_keys: Vec<String>,
}

impl VaultConfig {
    pub fn config_path(vault_root: &Path) -> PathBuf {
        vault_root.join(".cast").join("config.yaml")
    }

    pub fn load(vault_root: &Path) -> Result<Self> {
        let path = Self::config_path(vault_root);
        let contents = std::fs::read_to_string(&path).map_err(|e| EngineError::ConfigError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let raw: RawConfig =
            serde_yaml::from_str(&contents).map_err(|e| EngineError::ConfigError {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if raw.cast_version != SUPPORTED_CAST_VERSION {
            return Err(EngineError::ConfigError {
                path,
                reason: format!(
                    "unsupported cast-version {:?}, expected {:?}",
                    raw.cast_version, SUPPORTED_CAST_VERSION
                ),
            });
        }

        let index = raw.index.unwrap_or_default();
        let merge = raw.merge.unwrap_or_default();

        Ok(VaultConfig {
            cast_version: raw.cast_version,
            vault_id: raw.vault.id,
            vault_root: raw.vault.root.unwrap_or_else(|| vault_root.to_path_buf()),
            include_patterns: if index.include.is_empty() {
                vec!["**/*.md".to_string()]
            } else {
                index.include
            },
            exclude_patterns: index.exclude,
            ephemeral_keys: if merge.ephemeral_keys.is_empty() {
                default_ephemeral_keys()
            } else {
                merge.ephemeral_keys
            },
        })
    }

    /// Build the default configuration for a freshly initialized vault.
    pub fn create_default(vault_root: &Path, vault_id: Option<String>) -> Self {
        let vault_id = vault_id.unwrap_or_else(|| {
            vault_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        VaultConfig {
            cast_version: SUPPORTED_CAST_VERSION.to_string(),
            vault_id,
            vault_root: vault_root.to_path_buf(),
            include_patterns: vec!["**/*.md".to_string()],
            exclude_patterns: Vec::new(),
            ephemeral_keys: default_ephemeral_keys(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path(&self.vault_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw = RawConfig {
            cast_version: self.cast_version.clone(),
            vault: VaultSection {
                id: self.vault_id.clone(),
                root: Some(self.vault_root.clone()),
            },
            index: Some(IndexSection {
                include: self.include_patterns.clone(),
                exclude: self.exclude_patterns.clone(),
            }),
            merge: Some(MergeSection {
                ephemeral_keys: self.ephemeral_keys.clone(),
            }),
        };

        let yaml = serde_yaml::to_string(&raw)?;
        crate::atomic::write_atomic(&path, yaml.as_bytes())
    }
}
