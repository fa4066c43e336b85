//! Three-way text merge (diff3 style)
//!
//! Aligns ours and theirs against the common base using the Myers edit
//! script, then walks the three sequences in step. Regions changed on one
//! side only are taken from that side; regions changed identically on
//! both sides are taken once; regions changed differently become conflict
//! regions, emitted between markers:
//!
//! ```text
//! <<<<<<< ours
//! <our lines>
//! =======
//! <their lines>
//! >>>>>>> theirs
//! ```
//!
//! An auto-resolution strategy replaces conflict regions with the chosen
//! side instead of markers.

use crate::artifacts::diff::diff_algorithm::{Edit, MyersDiff};
use std::collections::HashMap;

/// Conflict auto-resolution strategy as selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ours,
    Theirs,
    Union,
    /// Side with the later committer timestamp wins (ties go to theirs)
    Recent,
}

impl Strategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ours" => Some(Strategy::Ours),
            "theirs" => Some(Strategy::Theirs),
            "union" => Some(Strategy::Union),
            "recent" => Some(Strategy::Recent),
            _ => None,
        }
    }
}

/// A strategy with `Recent` already resolved to a concrete side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSide {
    Ours,
    Theirs,
    Union,
}

impl Strategy {
    /// Resolve to a concrete side; `ours_is_recent` orders the `Recent`
    /// strategy (equal timestamps resolve to theirs).
    pub fn resolve(self, ours_is_recent: bool) -> ResolvedSide {
        match self {
            Strategy::Ours => ResolvedSide::Ours,
            Strategy::Theirs => ResolvedSide::Theirs,
            Strategy::Union => ResolvedSide::Union,
            Strategy::Recent => {
                if ours_is_recent {
                    ResolvedSide::Ours
                } else {
                    ResolvedSide::Theirs
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedText {
    pub content: Vec<u8>,
    /// False when at least one conflict region was emitted with markers
    pub clean: bool,
}

/// Split into lines keeping terminators, so content round-trips exactly
pub fn split_lines(data: &[u8]) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            lines.push(data[start..=i].to_vec());
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(data[start..].to_vec());
    }

    lines
}

/// Map of base line index to side line index over the `Equal` edits
fn alignment(base: &[Vec<u8>], side: &[Vec<u8>]) -> HashMap<usize, usize> {
    MyersDiff::new(base, side)
        .diff()
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Equal { line_a, line_b } => Some((line_a.number - 1, line_b.number - 1)),
            _ => None,
        })
        .collect()
}

fn emit_lines(out: &mut Vec<u8>, lines: &[Vec<u8>]) {
    for line in lines {
        out.extend_from_slice(line);
    }
}

/// Terminate the output with a newline before a marker line follows
fn ensure_newline(out: &mut Vec<u8>) {
    if !out.is_empty() && out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
}

pub fn merge_text(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    labels: (&str, &str),
    resolve: Option<ResolvedSide>,
) -> MergedText {
    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let ours_map = alignment(&base_lines, &ours_lines);
    let theirs_map = alignment(&base_lines, &theirs_lines);

    let mut content = Vec::new();
    let mut clean = true;
    let (mut i, mut o, mut t) = (0usize, 0usize, 0usize);

    loop {
        // copy through while all three sequences are aligned
        while i < base_lines.len()
            && ours_map.get(&i) == Some(&o)
            && theirs_map.get(&i) == Some(&t)
        {
            content.extend_from_slice(&ours_lines[o]);
            i += 1;
            o += 1;
            t += 1;
        }

        if i >= base_lines.len() && o >= ours_lines.len() && t >= theirs_lines.len() {
            break;
        }

        // the next base line matched by both sides bounds the chunk
        let stable = (i..base_lines.len()).find_map(|j| {
            match (ours_map.get(&j), theirs_map.get(&j)) {
                (Some(&oj), Some(&tj)) if oj >= o && tj >= t => Some((j, oj, tj)),
                _ => None,
            }
        });
        let (bj, oj, tj) =
            stable.unwrap_or((base_lines.len(), ours_lines.len(), theirs_lines.len()));

        let base_chunk = &base_lines[i..bj];
        let ours_chunk = &ours_lines[o..oj];
        let theirs_chunk = &theirs_lines[t..tj];

        if ours_chunk == theirs_chunk {
            // both sides made the same change
            emit_lines(&mut content, ours_chunk);
        } else if base_chunk == ours_chunk {
            emit_lines(&mut content, theirs_chunk);
        } else if base_chunk == theirs_chunk {
            emit_lines(&mut content, ours_chunk);
        } else {
            match resolve {
                Some(ResolvedSide::Ours) => emit_lines(&mut content, ours_chunk),
                Some(ResolvedSide::Theirs) => emit_lines(&mut content, theirs_chunk),
                Some(ResolvedSide::Union) => {
                    emit_lines(&mut content, ours_chunk);
                    if !theirs_chunk.is_empty() {
                        ensure_newline(&mut content);
                    }
                    emit_lines(&mut content, theirs_chunk);
                }
                None => {
                    clean = false;
                    ensure_newline(&mut content);
                    content.extend_from_slice(format!("<<<<<<< {}\n", labels.0).as_bytes());
                    emit_lines(&mut content, ours_chunk);
                    ensure_newline(&mut content);
                    content.extend_from_slice(b"=======\n");
                    emit_lines(&mut content, theirs_chunk);
                    ensure_newline(&mut content);
                    content.extend_from_slice(format!(">>>>>>> {}\n", labels.1).as_bytes());
                }
            }
        }

        (i, o, t) = (bj, oj, tj);
    }

    MergedText { content, clean }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const LABELS: (&str, &str) = ("ours", "theirs");

    #[rstest]
    fn non_overlapping_edits_merge_cleanly() {
        let base = b"1\n2\n3\n";
        let ours = b"one\n2\n3\n";
        let theirs = b"1\n2\nthree\n";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"one\n2\nthree\n");
    }

    #[rstest]
    fn identical_edits_merge_once() {
        let base = b"a\nb\n";
        let both = b"a\nchanged\n";

        let merged = merge_text(base, both, both, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"a\nchanged\n");
    }

    #[rstest]
    fn conflicting_edits_emit_markers() {
        let base = b"x\n";
        let ours = b"y\n";
        let theirs = b"z\n";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(!merged.clean);
        assert_eq!(
            merged.content,
            b"<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n"
        );
    }

    #[rstest]
    fn one_sided_insert_is_taken() {
        let base = b"a\nc\n";
        let ours = b"a\nb\nc\n";
        let theirs = b"a\nc\n";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"a\nb\nc\n");
    }

    #[rstest]
    fn one_sided_delete_is_taken() {
        let base = b"a\nb\nc\n";
        let ours = b"a\nb\nc\n";
        let theirs = b"a\nc\n";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"a\nc\n");
    }

    #[rstest]
    fn ours_strategy_keeps_left_side() {
        let merged = merge_text(b"x\n", b"y\n", b"z\n", LABELS, Some(ResolvedSide::Ours));
        assert!(merged.clean);
        assert_eq!(merged.content, b"y\n");
    }

    #[rstest]
    fn theirs_strategy_keeps_right_side() {
        let merged = merge_text(b"x\n", b"y\n", b"z\n", LABELS, Some(ResolvedSide::Theirs));
        assert!(merged.clean);
        assert_eq!(merged.content, b"z\n");
    }

    #[rstest]
    fn union_strategy_concatenates() {
        let merged = merge_text(b"x\n", b"y\n", b"z\n", LABELS, Some(ResolvedSide::Union));
        assert!(merged.clean);
        assert_eq!(merged.content, b"y\nz\n");
    }

    #[rstest]
    fn missing_trailing_newline_is_preserved_when_clean() {
        let base = b"1\n2";
        let ours = b"one\n2";
        let theirs = b"1\n2";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"one\n2");
    }

    #[rstest]
    fn conflict_without_trailing_newline_still_terminates_markers() {
        let merged = merge_text(b"x", b"y", b"z", LABELS, None);
        assert!(!merged.clean);
        assert_eq!(
            merged.content,
            b"<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n"
        );
    }

    #[rstest]
    fn existing_markers_in_stable_regions_survive() {
        let base = b"<<<<<<< keep\nmid\n>>>>>>> keep\nend\n";
        let ours = b"<<<<<<< keep\nmid\n>>>>>>> keep\nend\n";
        let theirs = b"<<<<<<< keep\nmid\n>>>>>>> keep\nfinish\n";

        let merged = merge_text(base, ours, theirs, LABELS, None);
        assert!(merged.clean);
        assert_eq!(merged.content, b"<<<<<<< keep\nmid\n>>>>>>> keep\nfinish\n");
    }

    #[rstest]
    fn both_sides_empty_base_conflict() {
        // add/add with different content, merged against the empty base
        let merged = merge_text(b"", b"left\n", b"right\n", LABELS, None);
        assert!(!merged.clean);
        assert_eq!(
            merged.content,
            b"<<<<<<< ours\nleft\n=======\nright\n>>>>>>> theirs\n"
        );
    }

    #[rstest]
    fn recent_strategy_resolution() {
        assert_eq!(Strategy::Recent.resolve(true), ResolvedSide::Ours);
        assert_eq!(Strategy::Recent.resolve(false), ResolvedSide::Theirs);
        assert_eq!(Strategy::Ours.resolve(false), ResolvedSide::Ours);
    }
}
