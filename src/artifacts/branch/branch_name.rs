use crate::artifacts::branch::INVALID_REF_NAME_REGEX;
use crate::errors::LitError;
use anyhow::Context;

const HEADS_PREFIX: &str = "refs/heads/";

/// A validated branch (or tag) short name
///
/// Hierarchical names (`feature/login`) are allowed; the forbidden
/// patterns follow Git's `check-ref-format` rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LitError::InvalidRefName { name }.into());
        }

        let re = regex::Regex::new(INVALID_REF_NAME_REGEX)
            .with_context(|| format!("invalid ref name regex: {INVALID_REF_NAME_REGEX}"))?;

        if re.is_match(&name) {
            return Err(LitError::InvalidRefName { name }.into());
        }

        Ok(Self(name))
    }

    /// Extract the branch name from a `refs/heads/...` path
    pub fn from_ref_path(ref_path: &str) -> anyhow::Result<Self> {
        let short = ref_path
            .strip_prefix(HEADS_PREFIX)
            .ok_or_else(|| LitError::InvalidRefName {
                name: ref_path.to_string(),
            })?;

        Self::try_parse(short)
    }

    /// The full `refs/heads/...` path of this branch
    pub fn to_ref_path(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
