//! Commit object
//!
//! Commits snapshot the repository at a point in time:
//! - a tree object id (directory snapshot)
//! - zero or more parent commit ids (two or more for merges)
//! - author and committer identities
//! - the commit message
//!
//! ## Format
//!
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::LitError;
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::{BufRead, Write};

/// Author or committer identity with timestamp
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Identity stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// `Name <email@example.com>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// The identity line as serialized into commits and tags
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Human-readable timestamp for log output
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }
}

/// Parse a `<unix-ts> <+hhmm>` pair into a timezone-carrying timestamp
pub fn parse_timestamp(seconds: i64, tz: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    let offset = parse_tz_offset(tz)
        .ok_or_else(|| anyhow::anyhow!("invalid timezone offset {tz:?}"))?;
    let utc = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid timestamp {seconds}"))?;

    Ok(utc.with_timezone(&offset))
}

fn parse_tz_offset(tz: &str) -> Option<FixedOffset> {
    if tz.len() != 5 {
        return None;
    }
    let sign = match &tz[..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[3..5].parse().ok()?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // "name <email> timestamp timezone", split from the right
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(LitError::Corrupt {
                kind: "commit",
                detail: format!("invalid identity line {value:?}"),
            }
            .into());
        }

        let timezone = parts[0];
        let seconds = parts[1]
            .parse::<i64>()
            .with_context(|| format!("invalid timestamp in identity line {value:?}"))?;
        let name_email = parts[2];

        let email_start = name_email.find('<').ok_or_else(|| LitError::Corrupt {
            kind: "commit",
            detail: format!("identity line missing '<': {value:?}"),
        })?;
        let email_end = name_email.find('>').ok_or_else(|| LitError::Corrupt {
            kind: "commit",
            detail: format!("identity line missing '>': {value:?}"),
        })?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();
        let timestamp = parse_timestamp(seconds, timezone)?;

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// Commit data reduced to what graph traversals need
///
/// Owning this small record lets the commit cache hand out cheap clones
/// during merge-base searches and revision walks.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: DateTime<FixedOffset>,
}

impl PartialOrd for SlimCommit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlimCommit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

/// Snapshot of the repository with history metadata
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    /// First line of the message, for one-line display
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    /// Committer timestamp, the one graph traversals order by
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.committer.timestamp()
    }

    pub fn to_slim(&self) -> anyhow::Result<SlimCommit> {
        Ok(SlimCommit {
            oid: self.object_id()?,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        })
    }

    fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));

        lines
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content = self.header_lines().join("\n");
        content.push_str("\n\n");
        content.push_str(&self.message);

        let mut commit_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), content.len());
        commit_bytes.write_all(header.as_bytes())?;
        commit_bytes.write_all(content.as_bytes())?;

        Ok(Bytes::from(commit_bytes))
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| LitError::Corrupt {
                kind: "commit",
                detail: "missing blank line before message".to_string(),
            })?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if let Some(rest) = line.strip_prefix("tree ") {
                tree_oid = Some(ObjectId::try_parse(rest)?);
            } else if let Some(rest) = line.strip_prefix("parent ") {
                parents.push(ObjectId::try_parse(rest)?);
            } else if let Some(rest) = line.strip_prefix("author ") {
                author = Some(Author::try_from(rest)?);
            } else if let Some(rest) = line.strip_prefix("committer ") {
                committer = Some(Author::try_from(rest)?);
            }
        }

        let tree_oid = tree_oid.ok_or_else(|| LitError::Corrupt {
            kind: "commit",
            detail: "missing tree header".to_string(),
        })?;
        let author = author.ok_or_else(|| LitError::Corrupt {
            kind: "commit",
            detail: "missing author header".to_string(),
        })?;
        let committer = committer.ok_or_else(|| LitError::Corrupt {
            kind: "commit",
            detail: "missing committer header".to_string(),
        })?;

        Ok(Self::new(
            parents,
            tree_oid,
            author,
            committer,
            message.to_string(),
        ))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        let mut lines = self.header_lines().join("\n");
        lines.push_str("\n\n");
        lines.push_str(&self.message);

        lines
    }
}
