//! Decision engine (component G): per-DocId, compute one of
//! `{CopyAtoB, CopyBtoA, AutoUseA, AutoUseB, Conflict, Skip}` from current
//! and baseline digests.

use crate::identity::DocId;
use crate::index::IndexEntry;

/// Membership role tag, parsed from a `cast-vaults` entry of form
/// `<name> (cast)` / `<name> (sync)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultRole {
    Cast,
    Sync,
}

/// Parse one `cast-vaults` entry into `(vault_name, role)`.
pub fn parse_membership_entry(entry: &str) -> Option<(&str, VaultRole)> {
    let entry = entry.trim();
    let open = entry.rfind('(')?;
    if !entry.ends_with(')') {
        return None;
    }
    let name = entry[..open].trim_end();
    if name.is_empty() {
        return None;
    }
    let role_str = &entry[open + 1..entry.len() - 1];
    let role = match role_str {
        "cast" => VaultRole::Cast,
        "sync" => VaultRole::Sync,
        _ => return None,
    };
    Some((name, role))
}

fn role_of<'a>(membership: &'a [String], vault_id: &str) -> Option<VaultRole> {
    membership
        .iter()
        .find_map(|e| parse_membership_entry(e).filter(|(n, _)| *n == vault_id).map(|(_, r)| r))
}

/// Whether both `v1` and `v2` appear, each with a valid role tag, in
/// `membership` (the pre-filter of §4.G).
fn both_are_participants(membership: &[String], v1: &str, v2: &str) -> bool {
    role_of(membership, v1).is_some() && role_of(membership, v2).is_some()
}

/// Policy knob resolving Open Question 1: a safe default restricting
/// `sync -> cast` propagation unless explicitly permitted.
#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
    pub allow_sync_to_cast: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            allow_sync_to_cast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    CopyAtoB,
    CopyBtoA,
    AutoUseA,
    AutoUseB,
    /// Both sides present and diverged; `overpower` forced V1's version
    /// (§4.I's distinct `OVERPOWER` action label, as opposed to the plain
    /// one-sided `CopyAtoB`).
    Overpower,
    Conflict,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAParticipant,
    InSync,
    OverpowerIgnoresRemoteOnly,
    RoleAsymmetry,
}

/// Decide the action for one DocId given both vaults' index entries (either
/// may be absent) and each side's recorded baseline against the other.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    id: &DocId,
    e1: Option<&IndexEntry>,
    e2: Option<&IndexEntry>,
    b1: Option<&str>,
    b2: Option<&str>,
    overpower: bool,
    v1_id: &str,
    v2_id: &str,
    policy: SyncPolicy,
) -> Decision {
    let _ = id;

    let membership: &[String] = match (e1, e2) {
        (Some(e), _) if !e.membership.is_empty() => &e.membership,
        (_, Some(e)) if !e.membership.is_empty() => &e.membership,
        (Some(e), None) => &e.membership,
        (None, Some(e)) => &e.membership,
        _ => &[],
    };

    if !both_are_participants(membership, v1_id, v2_id) {
        return Decision::Skip(SkipReason::NotAParticipant);
    }

    if !policy.allow_sync_to_cast {
        if let (Some(r1), Some(r2)) = (role_of(membership, v1_id), role_of(membership, v2_id)) {
            if r1 == VaultRole::Sync && r2 == VaultRole::Cast {
                return Decision::Skip(SkipReason::RoleAsymmetry);
            }
        }
    }

    match (e1, e2) {
        (Some(_), None) => Decision::CopyAtoB,
        (None, Some(_)) => {
            if overpower {
                Decision::Skip(SkipReason::OverpowerIgnoresRemoteOnly)
            } else {
                Decision::CopyBtoA
            }
        }
        (Some(e1), Some(e2)) => {
            let d1 = e1.digest.as_str();
            let d2 = e2.digest.as_str();

            if d1 == d2 {
                return Decision::Skip(SkipReason::InSync);
            }
            if overpower {
                return Decision::Overpower;
            }

            let b1_matches_d2 = b1.is_some_and(|b| b == d2);
            let b2_matches_d1 = b2.is_some_and(|b| b == d1);

            match (b1_matches_d2, b2_matches_d1) {
                (true, true) => Decision::Skip(SkipReason::InSync),
                (true, false) => Decision::AutoUseA,
                (false, true) => Decision::AutoUseB,
                (false, false) => Decision::Conflict,
            }
        }
        (None, None) => Decision::Skip(SkipReason::NotAParticipant),
    }
}
