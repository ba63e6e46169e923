//! Selector (component D): enumerate syncable files under a vault root,
//! subject to include/exclude glob patterns using git-ignore semantics.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;

const IMPLICIT_EXCLUDES: &[&str] = &[".cast/", ".cast/**"];

fn build_spec(root: &Path, patterns: &[String]) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        // GitignoreBuilder surfaces parse errors per-pattern; a malformed
        // pattern is simply dropped rather than aborting the whole selector,
        // since an include/exclude list is config, not file content.
        let _ = builder.add_line(None, pattern);
    }
    builder.build().unwrap_or_else(|_| {
        GitignoreBuilder::new(root)
            .build()
            .expect("empty gitignore builder always builds")
    })
}

/// Enumerate regular files under `root` that match at least one include
/// pattern and no exclude pattern (gitwildmatch semantics), returned as a
/// deterministic, sorted list of paths relative to `root`. The vault's own
/// `.cast/` directory is always implicitly excluded.
pub fn select_files(root: &Path, include: &[String], exclude: &[String]) -> Vec<PathBuf> {
    let include_patterns: Vec<String> = if include.is_empty() {
        vec!["**/*".to_string()]
    } else {
        include.to_vec()
    };

    let mut exclude_patterns = exclude.to_vec();
    exclude_patterns.extend(IMPLICIT_EXCLUDES.iter().map(|s| s.to_string()));

    let include_spec = build_spec(root, &include_patterns);
    let exclude_spec = build_spec(root, &exclude_patterns);

    let mut selected = Vec::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .build();

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };

        if exclude_spec.matched(rel, false).is_ignore() {
            continue;
        }
        if !include_spec.matched(rel, false).is_ignore() {
            continue;
        }

        selected.push(rel.to_path_buf());
    }

    selected.sort();
    selected
}
