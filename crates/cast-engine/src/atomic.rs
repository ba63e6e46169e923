//! Atomic write helper shared by the index, sync-state store, and
//! orchestrator: write to a sibling temporary file, fsync, then rename over
//! the target so readers only ever observe the old or the new content.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{EngineError, Result};

/// Write `contents` to `path` atomically. Creates parent directories if
/// necessary.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| EngineError::WriteFailure {
        path: path.to_path_buf(),
        reason: "path has no parent directory".to_string(),
    })?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| EngineError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    tmp.write_all(contents).map_err(|e| EngineError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tmp.as_file_mut().sync_all().map_err(|e| EngineError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    tmp.persist(path).map_err(|e| EngineError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Copy `src`'s bytes to `dst` atomically (read then atomic write), used by
/// the orchestrator when propagating whole files between vaults.
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
    let contents = std::fs::read(src)?;
    write_atomic(dst, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/deep/file.txt");
        write_atomic(&target, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn write_atomic_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("file.txt");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
    }

    #[test]
    fn copy_atomic_duplicates_bytes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        std::fs::write(&src, b"payload").unwrap();
        copy_atomic(&src, &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }
}
