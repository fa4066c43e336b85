//! ASCII commit-graph rendering
//!
//! Each active branch of history occupies a column. A commit prints `*`
//! in its column with `|` in the others; a merge opens new columns via a
//! `|\` connector line, and a fork point closing a column emits `|/`.
//!
//! The renderer is fed commits in walk order (newest first) and keeps the
//! column state between lines.

use crate::artifacts::objects::object_id::ObjectId;

#[derive(Debug, Default)]
pub struct GraphRenderer {
    /// Commit each column is waiting for
    columns: Vec<ObjectId>,
}

impl GraphRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the lines for one commit: the `*` line prefix plus any
    /// connector lines that follow it.
    ///
    /// The caller appends the commit summary to the first returned line.
    pub fn render(&mut self, oid: &ObjectId, parents: &[ObjectId]) -> (String, Vec<String>) {
        let column = match self.columns.iter().position(|c| c == oid) {
            Some(column) => column,
            None => {
                self.columns.push(oid.clone());
                self.columns.len() - 1
            }
        };

        let mut commit_line = String::new();
        for (i, _) in self.columns.iter().enumerate() {
            commit_line.push(if i == column { '*' } else { '|' });
            commit_line.push(' ');
        }

        let mut connectors = Vec::new();

        match parents {
            [] => {
                // history ends here: the column disappears
                self.columns.remove(column);
            }
            [first] => {
                self.columns[column] = first.clone();
                connectors.extend(self.collapse_duplicates(column));
            }
            [first, rest @ ..] => {
                self.columns[column] = first.clone();

                let mut opened = 0;
                for parent in rest {
                    if !self.columns.contains(parent) {
                        self.columns.insert(column + 1 + opened, parent.clone());
                        opened += 1;
                    }
                }

                if opened > 0 {
                    // |\ connector under the merge commit
                    let mut line = String::new();
                    for _ in 0..=column {
                        line.push('|');
                        line.push(' ');
                    }
                    line.pop();
                    for _ in 0..opened {
                        line.push('\\');
                        line.push(' ');
                    }
                    line.pop();
                    connectors.push(line);
                }
                connectors.extend(self.collapse_duplicates(column));
            }
        }

        (commit_line, connectors)
    }

    /// When two columns wait for the same commit the branches have
    /// rejoined; keep the leftmost column and emit a `|/` line.
    fn collapse_duplicates(&mut self, changed: usize) -> Vec<String> {
        let mut connectors = Vec::new();

        let target = match self.columns.get(changed) {
            Some(oid) => oid.clone(),
            None => return connectors,
        };

        while let Some(duplicate) = self
            .columns
            .iter()
            .enumerate()
            .find(|(i, oid)| *i != changed && **oid == target)
            .map(|(i, _)| i)
        {
            let drop = changed.max(duplicate);
            self.columns.remove(drop);

            let mut line = String::new();
            for _ in 0..drop {
                line.push('|');
                line.push(' ');
            }
            line.pop();
            line.push('/');
            connectors.push(line);

            if duplicate < changed {
                break;
            }
        }

        connectors
    }
}
