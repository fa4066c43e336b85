//! Line diff via Myers' shortest-edit-script algorithm
//!
//! Produces an edit script of `Delete` / `Insert` / `Equal` steps between
//! two sequences, then groups the changed runs into unified-format hunks
//! with surrounding context. Hunks closer than `2 * context` equal lines
//! are merged into one.

use derive_new::new;
use std::fmt::Display;

/// Number of context lines around a hunk
pub const HUNK_CONTEXT: usize = 3;

type Lines<T> = Vec<Line<T>>;

/// A sequence element tagged with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Line<T> {
    pub number: usize,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<T> {
    Delete { line: Line<T> },
    Insert { line: Line<T> },
    Equal { line_a: Line<T>, line_b: Line<T> },
}

impl<T> Edit<T> {
    pub fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

impl<T> Edit<T>
where
    T: Clone + Into<String>,
{
    pub fn as_string(&self) -> String {
        match self {
            Edit::Delete { line } => format!("-{}", line.value.clone().into()),
            Edit::Insert { line } => format!("+{}", line.value.clone().into()),
            Edit::Equal { line_a, .. } => format!(" {}", line_a.value.clone().into()),
        }
    }
}

impl<T> Display for Edit<T>
where
    T: Clone + Into<String>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// One unified-format hunk
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Hunk<T> {
    a_start: usize,
    a_size: usize,
    b_start: usize,
    b_size: usize,
    edits: Vec<Edit<T>>,
}

impl<T> Hunk<T> {
    pub fn a_start(&self) -> usize {
        self.a_start
    }

    pub fn a_size(&self) -> usize {
        self.a_size
    }

    pub fn b_start(&self) -> usize {
        self.b_start
    }

    pub fn b_size(&self) -> usize {
        self.b_size
    }

    pub fn edits(&self) -> &[Edit<T>] {
        &self.edits
    }

    /// `@@ -a_start,a_size +b_start,b_size @@`
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.a_start, self.a_size, self.b_start, self.b_size
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MyersDiff<T> {
    a: Lines<T>,
    b: Lines<T>,
}

impl<T: Eq + Clone> MyersDiff<T> {
    pub fn new(a: &[T], b: &[T]) -> Self {
        MyersDiff {
            a: Self::lines(a),
            b: Self::lines(b),
        }
    }

    fn lines(document: &[T]) -> Lines<T> {
        document
            .iter()
            .enumerate()
            .map(|(i, v)| Line::new(i + 1, v.clone()))
            .collect()
    }

    /// Forward pass: record the furthest-reaching x per diagonal for each
    /// edit distance d, stopping when the end is reached.
    fn compute_shortest_edit(&self) -> Vec<Vec<isize>> {
        let (n, m) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (n + m) as usize;

        let mut v = vec![0isize; 2 * offset + 1];
        let mut trace = Vec::new();

        for d in 0..=(n + m) {
            trace.push(v.clone());

            for k in (-d..=d).step_by(2) {
                let idx = (offset as isize + k) as usize;

                let mut x = if k == -d {
                    // only reachable by an insertion from k+1
                    v[idx + 1]
                } else if k == d {
                    // only reachable by a deletion from k-1
                    v[idx - 1] + 1
                } else {
                    let x_del = v[idx - 1] + 1;
                    let x_ins = v[idx + 1];
                    if x_del > x_ins { x_del } else { x_ins }
                };

                let mut y = x - k;
                while x < n && y < m && self.a[x as usize].value == self.b[y as usize].value {
                    // snake
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return trace;
                }
            }
        }

        trace
    }

    fn backtrack(&self) -> Vec<(isize, isize, isize, isize)> {
        let (mut x, mut y) = (self.a.len() as isize, self.b.len() as isize);
        let offset = (x + y) as usize;
        let mut edit_path = Vec::new();

        let trace = self.compute_shortest_edit();

        for (d, v) in trace.iter().enumerate().rev() {
            let k = x - y;

            let prev_k = if k == -(d as isize) {
                k + 1
            } else if k == (d as isize) {
                k - 1
            } else {
                let k_del = k - 1;
                let k_ins = k + 1;
                if v[(offset as isize + k_del) as usize] + 1 > v[(offset as isize + k_ins) as usize]
                {
                    k_del
                } else {
                    k_ins
                }
            };

            let prev_x = v[(offset as isize + prev_k) as usize];
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                edit_path.push((x - 1, y - 1, x, y));
                x -= 1;
                y -= 1;
            }

            if d > 0 {
                edit_path.push((prev_x, prev_y, x, y));
            }

            (x, y) = (prev_x, prev_y);
        }

        edit_path
    }

    /// The full edit script, oldest line first
    pub fn diff(&self) -> Vec<Edit<T>> {
        if self.a.is_empty() && self.b.is_empty() {
            return Vec::new();
        }

        let mut diff = Vec::new();

        for (prev_x, prev_y, x, y) in self.backtrack() {
            if x == prev_x {
                // insertion: only y advanced
                if prev_y < self.b.len() as isize {
                    diff.push(Edit::Insert {
                        line: self.b[prev_y as usize].clone(),
                    });
                }
            } else if y == prev_y {
                // deletion: only x advanced
                if prev_x < self.a.len() as isize {
                    diff.push(Edit::Delete {
                        line: self.a[prev_x as usize].clone(),
                    });
                }
            } else if prev_x < self.a.len() as isize {
                diff.push(Edit::Equal {
                    line_a: self.a[prev_x as usize].clone(),
                    line_b: self.b[prev_y as usize].clone(),
                });
            }
        }

        diff.reverse();
        diff
    }

    /// Group the edit script into unified hunks with context
    pub fn hunks(&self) -> Vec<Hunk<T>> {
        let edits = self.diff();
        build_hunks(&edits, HUNK_CONTEXT)
    }
}

/// Assemble hunks from an edit script, merging groups of changes whose
/// gap of equal lines is at most `2 * context`.
pub fn build_hunks<T: Clone>(edits: &[Edit<T>], context: usize) -> Vec<Hunk<T>> {
    let changed: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.is_change())
        .map(|(i, _)| i)
        .collect();

    if changed.is_empty() {
        return Vec::new();
    }

    // group changed indices; a gap wider than 2*context splits hunks
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = changed[0];
    let mut end = changed[0];
    for &idx in &changed[1..] {
        if idx - end > 2 * context {
            groups.push((start, end));
            start = idx;
        }
        end = idx;
    }
    groups.push((start, end));

    let mut hunks = Vec::new();
    for (first, last) in groups {
        let from = first.saturating_sub(context);
        let to = (last + context).min(edits.len() - 1);

        // lines of each side consumed before the hunk
        let a_before = edits[..from]
            .iter()
            .filter(|e| matches!(e, Edit::Delete { .. } | Edit::Equal { .. }))
            .count();
        let b_before = edits[..from]
            .iter()
            .filter(|e| matches!(e, Edit::Insert { .. } | Edit::Equal { .. }))
            .count();

        let hunk_edits: Vec<Edit<T>> = edits[from..=to].to_vec();
        let a_size = hunk_edits
            .iter()
            .filter(|e| matches!(e, Edit::Delete { .. } | Edit::Equal { .. }))
            .count();
        let b_size = hunk_edits
            .iter()
            .filter(|e| matches!(e, Edit::Insert { .. } | Edit::Equal { .. }))
            .count();

        // a zero-length side reports the preceding line number
        let a_start = if a_size == 0 { a_before } else { a_before + 1 };
        let b_start = if b_size == 0 { b_before } else { b_before + 1 };

        hunks.push(Hunk::new(a_start, a_size, b_start, b_size, hunk_edits));
    }

    hunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn file_inputs() -> (Vec<&'static str>, Vec<&'static str>) {
        (
            vec!["line1", "line2", "line3", "line4"],
            vec!["line2", "line3_modified", "line4", "line5"],
        )
    }

    #[rstest]
    fn diff_of_equal_sequences_is_all_equal(file_inputs: (Vec<&'static str>, Vec<&'static str>)) {
        let (a, _) = file_inputs;
        let edits = MyersDiff::new(&a, &a).diff();
        assert_eq!(edits.len(), a.len());
        assert!(edits.iter().all(|e| !e.is_change()));
    }

    #[rstest]
    fn diff_of_empty_sequences_is_empty() {
        let empty: Vec<&str> = Vec::new();
        assert!(MyersDiff::new(&empty, &empty).diff().is_empty());
    }

    #[rstest]
    fn diff_against_empty_is_all_insertions() {
        let empty: Vec<&str> = Vec::new();
        let b = vec!["one", "two"];
        let edits = MyersDiff::new(&empty, &b).diff();
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|e| matches!(e, Edit::Insert { .. })));
    }

    #[rstest]
    fn classic_myers_example() {
        let a: Vec<char> = "abcabba".chars().collect();
        let b: Vec<char> = "cbabac".chars().collect();
        let edits = MyersDiff::new(&a, &b).diff();

        // shortest edit script for the canonical example has 5 changes
        let changes = edits.iter().filter(|e| e.is_change()).count();
        assert_eq!(changes, 5);

        // reconstruct b from the script
        let reconstructed: Vec<char> = edits
            .iter()
            .filter_map(|e| match e {
                Edit::Insert { line } => Some(line.value),
                Edit::Equal { line_b, .. } => Some(line_b.value),
                Edit::Delete { .. } => None,
            })
            .collect();
        assert_eq!(reconstructed, b);
    }

    #[rstest]
    fn edit_script_reconstructs_both_sides(file_inputs: (Vec<&'static str>, Vec<&'static str>)) {
        let (a, b) = file_inputs;
        let edits = MyersDiff::new(&a, &b).diff();

        let a_side: Vec<&str> = edits
            .iter()
            .filter_map(|e| match e {
                Edit::Delete { line } => Some(line.value),
                Edit::Equal { line_a, .. } => Some(line_a.value),
                Edit::Insert { .. } => None,
            })
            .collect();
        let b_side: Vec<&str> = edits
            .iter()
            .filter_map(|e| match e {
                Edit::Insert { line } => Some(line.value),
                Edit::Equal { line_b, .. } => Some(line_b.value),
                Edit::Delete { .. } => None,
            })
            .collect();

        assert_eq!(a_side, a);
        assert_eq!(b_side, b);
    }

    #[rstest]
    fn single_change_yields_one_hunk(file_inputs: (Vec<&'static str>, Vec<&'static str>)) {
        let (a, b) = file_inputs;
        let hunks = MyersDiff::new(&a, &b).hunks();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].a_start(), 1);
        assert_eq!(hunks[0].b_start(), 1);
    }

    #[rstest]
    fn distant_changes_split_into_hunks() {
        let mut a: Vec<String> = (1..=30).map(|i| format!("line{i}")).collect();
        let mut b = a.clone();
        a[1] = "changed-a-top".to_string();
        b[1] = "changed-b-top".to_string();
        a[27] = "changed-a-bottom".to_string();
        b[27] = "changed-b-bottom".to_string();

        let hunks = MyersDiff::new(&a, &b).hunks();
        assert_eq!(hunks.len(), 2);
    }

    #[rstest]
    fn close_changes_merge_into_one_hunk() {
        let a: Vec<String> = (1..=12).map(|i| format!("line{i}")).collect();
        let mut b = a.clone();
        b[2] = "x".to_string();
        b[7] = "y".to_string();

        // gap of 4 equal lines <= 2*context, so a single hunk
        let hunks = MyersDiff::new(&a, &b).hunks();
        assert_eq!(hunks.len(), 1);
    }

    #[rstest]
    fn hunk_sizes_count_each_side() {
        let a = vec!["keep", "old"];
        let b = vec!["keep", "new", "extra"];
        let hunks = MyersDiff::new(&a, &b).hunks();

        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.a_size(), 2);
        assert_eq!(hunk.b_size(), 3);
    }
}
