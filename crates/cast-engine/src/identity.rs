//! Identity service: generation, recognition, and injection of document
//! identifiers (component B).
//!
//! A [`DocId`] is a 128-bit random value rendered as the canonical grouped
//! hex string `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, stored verbatim as the
//! `cast-id` frontmatter field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frontmatter::{Document, FrontmatterValue, SyncManagedKey};

/// Opaque 128-bit document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(Uuid);

impl DocId {
    /// Generate a fresh, random identifier. Never produces the nil UUID.
    pub fn generate() -> Self {
        loop {
            let id = Uuid::new_v4();
            if !id.is_nil() {
                return Self(id);
            }
        }
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for DocId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of [`ensure_present`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// `cast-id` already present and correctly ordered; no write.
    AlreadyPresent(DocId),
    /// `cast-id` present but was not the first key; file rewritten.
    Reordered(DocId),
    /// `cast-id` absent, a sync-managed key was present, and `auto_fix` was
    /// set; a fresh id was generated and injected.
    Generated(DocId),
    /// `cast-id` absent, `auto_fix` was false; file left out of the index.
    SkippedNoAutoFix,
    /// `cast-id` absent and no sync-managed key present; not a sync
    /// participant, left untouched.
    NotAParticipant,
}

/// Parse the `cast-id` field out of an already-parsed document, if present
/// and well-formed.
pub fn read(document: &Document) -> Option<DocId> {
    match document.frontmatter.get("cast-id") {
        Some(FrontmatterValue::Scalar(v)) => v.as_str().and_then(|s| s.parse().ok()),
        _ => None,
    }
}

fn has_any_sync_managed_key(document: &Document) -> bool {
    document
        .frontmatter
        .keys()
        .any(|k| SyncManagedKey::classify(k).is_some() && k != "cast-id")
}

/// Apply §4.B's `ensure_present` decision to an in-memory document. Returns
/// the outcome and, when a write is needed, the document mutated in place
/// (callers persist via the frontmatter codec + atomic write).
pub fn ensure_present(document: &mut Document, auto_fix: bool) -> EnsureOutcome {
    if let Some(id) = read(document) {
        if document.frontmatter.is_canonically_ordered() {
            EnsureOutcome::AlreadyPresent(id)
        } else {
            document.frontmatter.promote_cast_id_first();
            EnsureOutcome::Reordered(id)
        }
    } else if has_any_sync_managed_key(document) {
        if auto_fix {
            let id = DocId::generate();
            document.frontmatter.inject_cast_id(id);
            EnsureOutcome::Generated(id)
        } else {
            EnsureOutcome::SkippedNoAutoFix
        }
    } else {
        EnsureOutcome::NotAParticipant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::{parse, serialize};

    #[test]
    fn generate_is_never_nil() {
        for _ in 0..1000 {
            assert_ne!(DocId::generate().as_uuid(), Uuid::nil());
        }
    }

    #[test]
    fn display_and_parse_roundtrip() {
        let id = DocId::generate();
        let parsed: DocId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn canonical_grammar_is_grouped_hex() {
        let id = DocId::generate();
        let s = id.to_string();
        let parts: Vec<&str> = s.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(
            parts.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
    }

    #[test]
    fn ensure_present_generates_when_sync_managed_key_present_and_auto_fix() {
        let content = "---\ncast-type: Note\n---\nbody\n";
        let mut doc = parse(content).unwrap();
        let outcome = ensure_present(&mut doc, true);
        assert!(matches!(outcome, EnsureOutcome::Generated(_)));
        assert_eq!(doc.frontmatter.first_key().unwrap(), "cast-id");
    }

    #[test]
    fn ensure_present_skips_without_auto_fix() {
        let content = "---\ncast-type: Note\n---\nbody\n";
        let mut doc = parse(content).unwrap();
        let outcome = ensure_present(&mut doc, false);
        assert_eq!(outcome, EnsureOutcome::SkippedNoAutoFix);
    }

    #[test]
    fn ensure_present_leaves_non_participant_untouched() {
        let content = "---\ntitle: Just a note\n---\nbody\n";
        let mut doc = parse(content).unwrap();
        let outcome = ensure_present(&mut doc, true);
        assert_eq!(outcome, EnsureOutcome::NotAParticipant);
        assert!(doc.frontmatter.get("cast-id").is_none());
    }

    #[test]
    fn ensure_present_reorders_misplaced_cast_id() {
        let content = "---\ntitle: Hi\ncast-id: 11111111-1111-1111-1111-111111111111\n---\nbody\n";
        let mut doc = parse(content).unwrap();
        let outcome = ensure_present(&mut doc, true);
        assert!(matches!(outcome, EnsureOutcome::Reordered(_)));
        assert_eq!(doc.frontmatter.first_key().unwrap(), "cast-id");
        let out = serialize(&doc);
        assert!(out.contains("cast-id: 11111111"));
    }

    #[test]
    fn ensure_present_already_present_is_a_noop() {
        let content = "---\ncast-id: 11111111-1111-1111-1111-111111111111\ntitle: Hi\n---\nbody\n";
        let mut doc = parse(content).unwrap();
        let outcome = ensure_present(&mut doc, true);
        assert!(matches!(outcome, EnsureOutcome::AlreadyPresent(_)));
    }
}
