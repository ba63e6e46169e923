//! Three-way merge (component H): line-level reconciliation producing a
//! clean merged text or one annotated with conflict markers.
//!
//! Grounded in `Merge3`'s diff3-style hunk merging, collapsed to its
//! two-input form since this engine's baseline is a digest, not a
//! reconstructable body (§4.H ¶2): `merge_two` aligns source against
//! destination directly via LCS. `merge3` is exposed for a caller that does
//! have a real common ancestor body.

const CONFLICT_MARKER_SIZE: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub text: String,
    pub conflict_count: usize,
}

fn lines_of(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split_inclusive('\n').collect()
}

/// Longest common subsequence of two line slices, returned as the list of
/// (index_in_a, index_in_b) pairs that match, in order.
fn lcs_pairs(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Align `source` against `dest` line-by-line via LCS (§4.H steps 2-4):
/// unchanged regions are emitted once, divergent regions become
/// `<<<<<<< SOURCE / ======= / >>>>>>> DESTINATION` blocks.
pub fn merge_two(source: &str, dest: &str) -> Merged {
    if source == dest {
        return Merged {
            text: source.to_string(),
            conflict_count: 0,
        };
    }

    let a = lines_of(source);
    let b = lines_of(dest);
    let matches = lcs_pairs(&a, &b);

    let marker_open = "<".repeat(CONFLICT_MARKER_SIZE);
    let marker_mid = "=".repeat(CONFLICT_MARKER_SIZE);
    let marker_close = ">".repeat(CONFLICT_MARKER_SIZE);

    let mut out = String::new();
    let mut conflict_count = 0;
    let (mut ai, mut bi) = (0usize, 0usize);

    let mut flush_divergent = |out: &mut String, a_range: &[&str], b_range: &[&str], conflict_count: &mut usize| {
        if a_range.is_empty() && b_range.is_empty() {
            return;
        }
        if a_range == b_range {
            for line in a_range {
                out.push_str(line);
            }
            return;
        }
        *conflict_count += 1;
        out.push_str(&marker_open);
        out.push_str(" SOURCE\n");
        for line in a_range {
            out.push_str(line);
        }
        out.push_str(&marker_mid);
        out.push('\n');
        for line in b_range {
            out.push_str(line);
        }
        out.push_str(&marker_close);
        out.push_str(" DESTINATION\n");
    };

    for (mi, mj) in matches {
        flush_divergent(&mut out, &a[ai..mi], &b[bi..mj], &mut conflict_count);
        out.push_str(a[mi]);
        ai = mi + 1;
        bi = mj + 1;
    }
    flush_divergent(&mut out, &a[ai..], &b[bi..], &mut conflict_count);

    Merged {
        text: out,
        conflict_count,
    }
}

/// General three-input entry point. With an empty/absent `base`, this
/// degrades to [`merge_two`] (the only shape this engine's orchestrator
/// actually drives, since its baseline is a digest rather than a body); a
/// non-empty `base` is reserved for a future caller that does have a real
/// common ancestor.
pub fn merge3(base: &str, source: &str, dest: &str) -> Merged {
    if base.is_empty() {
        return merge_two(source, dest);
    }
    if source == dest {
        return Merged {
            text: source.to_string(),
            conflict_count: 0,
        };
    }
    if base == source {
        return Merged {
            text: dest.to_string(),
            conflict_count: 0,
        };
    }
    if base == dest {
        return Merged {
            text: source.to_string(),
            conflict_count: 0,
        };
    }
    merge_two(source, dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_no_markers() {
        let body = "line one\nline two\n";
        let merged = merge_two(body, body);
        assert_eq!(merged.text, body);
        assert_eq!(merged.conflict_count, 0);
    }

    #[test]
    fn disjoint_edits_are_both_preserved_in_order() {
        let source = "first\nsecond\nthird\n";
        let dest = "first\nsecond (dest edit)\nthird\n";
        let merged = merge_two(source, dest);
        assert!(merged.text.contains("SOURCE"));
        assert!(merged.text.contains("second\n"));
        assert!(merged.text.contains("second (dest edit)\n"));
        assert_eq!(merged.conflict_count, 1);
    }

    #[test]
    fn marker_counts_are_balanced() {
        let source = "a\nb\nc\n";
        let dest = "a\nx\ny\nc\n";
        let merged = merge_two(source, dest);
        let opens = merged.text.matches("<<<<<<< SOURCE").count();
        let mids = merged.text.matches("=======").count();
        let closes = merged.text.matches(">>>>>>> DESTINATION").count();
        assert_eq!(opens, mids);
        assert_eq!(mids, closes);
        assert_eq!(opens, merged.conflict_count);
    }

    #[test]
    fn unchanged_prefix_and_suffix_appear_once() {
        let source = "shared start\nsource only\nshared end\n";
        let dest = "shared start\ndest only\nshared end\n";
        let merged = merge_two(source, dest);
        assert_eq!(merged.text.matches("shared start\n").count(), 1);
        assert_eq!(merged.text.matches("shared end\n").count(), 1);
    }

    #[test]
    fn identical_divergent_edits_do_not_manufacture_a_conflict() {
        let source = "a\nsame edit\nc\n";
        let dest = "a\nsame edit\nc\n";
        let merged = merge_two(source, dest);
        assert_eq!(merged.conflict_count, 0);
        assert_eq!(merged.text, source);
    }

    #[test]
    fn merge3_with_empty_base_degrades_to_two_way() {
        let source = "a\nb\n";
        let dest = "a\nc\n";
        let via_three = merge3("", source, dest);
        let via_two = merge_two(source, dest);
        assert_eq!(via_three, via_two);
    }

    #[test]
    fn merge3_prefers_the_side_that_diverged_from_base() {
        let base = "a\nb\n";
        let source = "a\nb\n";
        let dest = "a\nb\nc\n";
        let merged = merge3(base, source, dest);
        assert_eq!(merged.text, dest);
        assert_eq!(merged.conflict_count, 0);
    }
}
