//! Normalization & digest (component C): canonicalize a document body and
//! hash it. Frontmatter never participates in the digest — this is what
//! makes local-field edits invisible to sync.

use sha2::{Digest, Sha256};

/// Canonicalize a body string: normalize line endings to LF, trim trailing
/// ASCII whitespace on every line, and guarantee exactly one terminating
/// newline when the body is non-empty.
pub fn canonicalize(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");

    let trimmed: String = normalized
        .split('\n')
        .map(|line| line.trim_end_matches(|c: char| c == ' ' || c == '\t'))
        .collect::<Vec<_>>()
        .join("\n");

    if trimmed.is_empty() {
        return trimmed;
    }

    if trimmed.ends_with('\n') {
        trimmed
    } else {
        let mut s = trimmed;
        s.push('\n');
        s
    }
}

/// Compute the `sha256:`-prefixed hex digest of a body's canonical form.
pub fn digest(body: &str) -> String {
    let canonical = canonicalize(body);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{hash:x}")
}

/// Verify that `body`'s canonical digest matches `expected`.
pub fn verify(body: &str, expected: &str) -> bool {
    digest(body) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_body_is_empty_canonical_form() {
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn canonicalize_normalizes_crlf() {
        assert_eq!(canonicalize("a\r\nb\r\n"), "a\nb\n");
    }

    #[test]
    fn canonicalize_normalizes_lone_cr() {
        assert_eq!(canonicalize("a\rb\r"), "a\nb\n");
    }

    #[test]
    fn canonicalize_trims_trailing_whitespace() {
        assert_eq!(canonicalize("a   \nb\t\n"), "a\nb\n");
    }

    #[test]
    fn canonicalize_ensures_single_terminal_newline() {
        assert_eq!(canonicalize("a\nb"), "a\nb\n");
        assert_eq!(canonicalize("a\nb\n\n"), "a\nb\n\n");
    }

    #[test]
    fn canonicalize_empty_stays_empty() {
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let inputs = ["a\r\nb  \nc", "", "x\n\n\n", "no newline at all"];
        for input in inputs {
            let once = canonicalize(input);
            let twice = canonicalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn digest_has_sha256_prefix_and_is_stable() {
        let body = "# Title\nsome content\n";
        let d1 = digest(body);
        let d2 = digest(body);
        assert_eq!(d1, d2);
        assert!(d1.starts_with("sha256:"));
        assert_eq!(d1.len(), "sha256:".len() + 64);
    }

    #[test]
    fn digest_is_insensitive_to_frontmatter() {
        use crate::frontmatter::{parse, serialize};

        let body = "# Title\nshared content\n";
        let with_fm1 = format!("---\ntags: [a]\n---\n{body}");
        let with_fm2 = format!("---\ntitle: Other\ncategory: x\n---\n{body}");

        let doc1 = parse(&with_fm1).unwrap();
        let doc2 = parse(&with_fm2).unwrap();

        assert_eq!(digest(&doc1.body), digest(&doc2.body));
        // re-serializing with different frontmatter still yields the same body digest
        let _ = serialize(&doc1);
        let _ = serialize(&doc2);
    }

    #[test]
    fn verify_roundtrip() {
        let body = "hello\nworld\n";
        let d = digest(body);
        assert!(verify(body, &d));
        assert!(!verify("different\n", &d));
    }
}
