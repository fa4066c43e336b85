//! Ignore-pattern matching for `.litignore` files
//!
//! Patterns follow gitignore semantics: leading `!` negates, leading `/`
//! anchors to the pattern's directory, trailing `/` matches directories
//! only, `**` spans path components, `*` and `?` stay within a component,
//! and `[...]` character classes are supported. The last matching pattern
//! wins. Tracked files are never consulted against the matcher; only
//! `add` and `status` query it.
//!
//! Patterns are loaded from a `.litignore` file at every directory level
//! plus the repository-wide `info/exclude` file.

use std::path::{Path, PathBuf};

/// One compiled pattern
#[derive(Debug)]
struct IgnorePattern {
    regex: regex::Regex,
    negation: bool,
    directory_only: bool,
}

impl IgnorePattern {
    /// Compile a single gitignore-style pattern rooted at `base`
    /// (repository-relative directory of the ignore file, `""` for the
    /// root or `info/exclude`).
    fn compile(raw: &str, base: &str) -> Option<Self> {
        let mut pattern = raw.trim_end();
        if pattern.is_empty() || pattern.starts_with('#') {
            return None;
        }

        let mut negation = false;
        if let Some(rest) = pattern.strip_prefix('!') {
            negation = true;
            pattern = rest;
        }

        let mut directory_only = false;
        if let Some(rest) = pattern.strip_suffix('/') {
            directory_only = true;
            pattern = rest;
        }

        // a slash anywhere (other than trailing) anchors the pattern to
        // the ignore file's directory
        let anchored = pattern.starts_with('/') || pattern.contains('/');
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);

        let mut regex_str = String::from("^");
        if base.is_empty() {
            if !anchored {
                regex_str.push_str("(?:.*/)?");
            }
        } else {
            regex_str.push_str(&regex::escape(base));
            regex_str.push('/');
            if !anchored {
                regex_str.push_str("(?:.*/)?");
            }
        }
        regex_str.push_str(&Self::glob_to_regex(pattern)?);
        // a match on a directory prefix ignores everything below it
        regex_str.push_str("(?:/.*)?$");

        let regex = regex::Regex::new(&regex_str).ok()?;

        Some(IgnorePattern {
            regex,
            negation,
            directory_only,
        })
    }

    fn glob_to_regex(pattern: &str) -> Option<String> {
        let mut out = String::new();
        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    if chars.get(i + 1) == Some(&'*') {
                        if chars.get(i + 2) == Some(&'/') {
                            // `**/` spans zero or more directories
                            out.push_str("(?:.*/)?");
                            i += 3;
                        } else {
                            out.push_str(".*");
                            i += 2;
                        }
                    } else {
                        out.push_str("[^/]*");
                        i += 1;
                    }
                }
                '?' => {
                    out.push_str("[^/]");
                    i += 1;
                }
                '[' => {
                    // find the closing bracket, honouring a leading ! or ]
                    let mut j = i + 1;
                    if chars.get(j) == Some(&'!') {
                        j += 1;
                    }
                    if chars.get(j) == Some(&']') {
                        j += 1;
                    }
                    while j < chars.len() && chars[j] != ']' {
                        j += 1;
                    }
                    if j < chars.len() {
                        let mut class: String = chars[i..=j].iter().collect();
                        if class.starts_with("[!") {
                            class = format!("[^{}", &class[2..]);
                        }
                        out.push_str(&class);
                        i = j + 1;
                    } else {
                        out.push_str(&regex::escape("["));
                        i += 1;
                    }
                }
                '/' => {
                    out.push('/');
                    i += 1;
                }
                c => {
                    out.push_str(&regex::escape(&c.to_string()));
                    i += 1;
                }
            }
        }

        Some(out)
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if !self.regex.is_match(path) {
            return false;
        }

        if self.directory_only && !is_dir {
            // a dir-only pattern covers files inside the directory but
            // not a plain file with the directory's name
            return path_has_matching_parent(&self.regex, path);
        }

        true
    }
}

fn path_has_matching_parent(regex: &regex::Regex, path: &str) -> bool {
    let mut parent = Path::new(path).parent();
    while let Some(dir) = parent {
        let dir_str = dir.to_string_lossy();
        if !dir_str.is_empty() && regex.is_match(&dir_str) {
            return true;
        }
        parent = dir.parent();
    }

    false
}

/// Matcher aggregating all ignore files of a repository
///
/// Later patterns override earlier ones, so files are loaded in
/// precedence order: `info/exclude` first, then `.litignore` files from
/// the root downward.
#[derive(Debug, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the matcher for a repository rooted at `root`
    pub fn load(root: &Path, exclude_file: &Path) -> Self {
        let mut matcher = IgnoreMatcher::new();

        if exclude_file.exists()
            && let Ok(content) = std::fs::read_to_string(exclude_file)
        {
            matcher.add_patterns(&content, "");
        }
        matcher.load_directory_files(root, root);

        matcher
    }

    fn load_directory_files(&mut self, root: &Path, dir: &Path) {
        let ignore_file = dir.join(".litignore");
        if ignore_file.exists()
            && let Ok(content) = std::fs::read_to_string(&ignore_file)
        {
            let base = dir
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            self.add_patterns(&content, &base);
        }

        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut subdirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                path.file_name()
                    .map(|name| name != crate::areas::repository::repo_dir_name().as_os_str())
                    .unwrap_or(true)
            })
            .collect();
        subdirs.sort();

        for subdir in subdirs {
            self.load_directory_files(root, &subdir);
        }
    }

    pub fn add_patterns(&mut self, content: &str, base: &str) {
        for line in content.lines() {
            if let Some(pattern) = IgnorePattern::compile(line, base) {
                self.patterns.push(pattern);
            }
        }
    }

    /// Whether `path` (repository-relative) should be ignored
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let path = path.to_string_lossy().replace('\\', "/");
        let path = path.strip_prefix("./").unwrap_or(&path);

        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(path, is_dir) {
                ignored = !pattern.negation;
            }
        }

        ignored
    }
}
