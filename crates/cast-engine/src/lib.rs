//! cast-engine: Markdown vault reconciliation engine.
//!
//! Provides identity assignment, the per-vault index, the pairwise
//! diff/merge decision machine with its last-seen-digest baseline store,
//! the three-way textual merge used when both sides moved, and the atomic,
//! lock-protected write-back that ties them together.

pub mod atomic;
pub mod config;
pub mod decision;
pub mod error;
pub mod frontmatter;
pub mod identity;
pub mod index;
pub mod lock;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod selector;
pub mod sync_state;

pub use config::VaultConfig;
pub use decision::{Decision, SkipReason, SyncPolicy, VaultRole};
pub use error::{EngineError, Result};
pub use frontmatter::{Document, Frontmatter, FrontmatterValue};
pub use identity::DocId;
pub use index::{Index, IndexBuildReport, IndexEntry};
pub use orchestrator::{ActionLabel, ActionRecord, ConflictChoice, ConflictMode, PeerResult, SyncReport};
pub use sync_state::SyncStateStore;
