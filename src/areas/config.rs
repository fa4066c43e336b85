//! Repository configuration
//!
//! Flat key/value store persisted at `config` in Git's line-oriented INI
//! dialect: `[section]` or `[section "subsection"]` headers followed by
//! `key = value` lines; `#` and `;` start comments.
//!
//! Keys are addressed as `section.name` or `section.subsection.name`
//! (e.g. `core.bare`, `remote.origin.url`). The subsection is everything
//! between the first and last dot, so `branch.feature/x.merge` works.

use crate::errors::LitError;
use std::collections::BTreeMap;
use std::path::Path;

type SectionKey = (String, Option<String>);

#[derive(Debug)]
pub struct Config {
    path: Box<Path>,
    sections: BTreeMap<SectionKey, BTreeMap<String, String>>,
}

impl Config {
    /// Load the config file, treating a missing file as empty
    pub fn load(path: Box<Path>) -> anyhow::Result<Self> {
        let mut sections = BTreeMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::parse(&content, &mut sections)?;
        }

        Ok(Config { path, sections })
    }

    fn parse(
        content: &str,
        sections: &mut BTreeMap<SectionKey, BTreeMap<String, String>>,
    ) -> anyhow::Result<()> {
        let mut current: Option<SectionKey> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let header = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .ok_or_else(|| LitError::Corrupt {
                        kind: "config",
                        detail: format!("malformed section header {raw_line:?}"),
                    })?;

                let key = match header.split_once(' ') {
                    Some((section, subsection)) => {
                        let subsection = subsection
                            .trim()
                            .strip_prefix('"')
                            .and_then(|s| s.strip_suffix('"'))
                            .ok_or_else(|| LitError::Corrupt {
                                kind: "config",
                                detail: format!("malformed subsection in {raw_line:?}"),
                            })?;
                        (section.to_ascii_lowercase(), Some(subsection.to_string()))
                    }
                    None => (header.to_ascii_lowercase(), None),
                };

                sections.entry(key.clone()).or_default();
                current = Some(key);
            } else if let Some((key, value)) = line.split_once('=') {
                let section = current.clone().ok_or_else(|| LitError::Corrupt {
                    kind: "config",
                    detail: format!("key outside of any section: {raw_line:?}"),
                })?;
                sections
                    .entry(section)
                    .or_default()
                    .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
            } else {
                return Err(LitError::Corrupt {
                    kind: "config",
                    detail: format!("malformed line {raw_line:?}"),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Split `section[.subsection].name` into its addressing parts
    fn split_key(key: &str) -> anyhow::Result<(SectionKey, String)> {
        let first_dot = key.find('.');
        let last_dot = key.rfind('.');

        match (first_dot, last_dot) {
            (Some(first), Some(last)) if first != last => {
                let section = key[..first].to_ascii_lowercase();
                let subsection = key[first + 1..last].to_string();
                let name = key[last + 1..].to_ascii_lowercase();
                Ok(((section, Some(subsection)), name))
            }
            (Some(first), _) => {
                let section = key[..first].to_ascii_lowercase();
                let name = key[first + 1..].to_ascii_lowercase();
                Ok(((section, None), name))
            }
            _ => Err(anyhow::anyhow!("invalid config key {key:?}")),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let (section, name) = Self::split_key(key).ok()?;
        self.sections.get(&section)?.get(&name).cloned()
    }

    pub fn is_true(&self, key: &str) -> bool {
        matches!(self.get(key).as_deref(), Some("true") | Some("yes") | Some("1"))
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let (section, name) = Self::split_key(key)?;
        self.sections
            .entry(section)
            .or_default()
            .insert(name, value.to_string());

        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> anyhow::Result<bool> {
        let (section, name) = Self::split_key(key)?;
        let removed = self
            .sections
            .get_mut(&section)
            .map(|values| values.remove(&name).is_some())
            .unwrap_or(false);

        if let Some(values) = self.sections.get(&section)
            && values.is_empty()
        {
            self.sections.remove(&section);
        }

        Ok(removed)
    }

    /// All keys in `section.name` / `section.subsection.name` form
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        for ((section, subsection), values) in &self.sections {
            for (name, value) in values {
                let key = match subsection {
                    Some(sub) => format!("{section}.{sub}.{name}"),
                    None => format!("{section}.{name}"),
                };
                entries.push((key, value.clone()));
            }
        }

        entries
    }

    /// Names of all configured remotes
    pub fn remotes(&self) -> Vec<String> {
        self.sections
            .keys()
            .filter_map(|(section, subsection)| {
                (section == "remote").then(|| subsection.clone()).flatten()
            })
            .collect()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut output = String::new();

        for ((section, subsection), values) in &self.sections {
            if values.is_empty() {
                continue;
            }

            match subsection {
                Some(sub) => output.push_str(&format!("[{section} \"{sub}\"]\n")),
                None => output.push_str(&format!("[{section}]\n")),
            }
            for (name, value) in values {
                output.push_str(&format!("\t{name} = {value}\n"));
            }
        }

        std::fs::write(&self.path, output)?;
        Ok(())
    }
}
