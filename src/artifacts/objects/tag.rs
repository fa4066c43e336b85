//! Annotated tag object
//!
//! ## Format
//!
//! ```text
//! tag <size>\0
//! object <oid>
//! type <kind>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```
//!
//! Lightweight tags are plain refs and never produce a tag object.

use crate::artifacts::objects::commit::Author;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::LitError;
use bytes::Bytes;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tag {
    target: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: Author,
    message: String,
}

impl Tag {
    pub fn new(
        target: ObjectId,
        target_type: ObjectType,
        name: String,
        tagger: Author,
        message: String,
    ) -> Self {
        Tag {
            target,
            target_type,
            name,
            tagger,
            message,
        }
    }

    pub fn target(&self) -> &ObjectId {
        &self.target
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &Author {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn text(&self) -> String {
        format!(
            "object {}\ntype {}\ntag {}\ntagger {}\n\n{}",
            self.target,
            self.target_type,
            self.name,
            self.tagger.display(),
            self.message
        )
    }
}

impl Packable for Tag {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let content = self.text();

        let mut tag_bytes = Vec::new();
        let header = format!("{} {}\0", self.object_type().as_str(), content.len());
        tag_bytes.write_all(header.as_bytes())?;
        tag_bytes.write_all(content.as_bytes())?;

        Ok(Bytes::from(tag_bytes))
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let content = reader
            .bytes()
            .collect::<Result<Vec<u8>, std::io::Error>>()?;
        let content = String::from_utf8(content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| LitError::Corrupt {
                kind: "tag",
                detail: "missing blank line before message".to_string(),
            })?;

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            if let Some(rest) = line.strip_prefix("object ") {
                target = Some(ObjectId::try_parse(rest)?);
            } else if let Some(rest) = line.strip_prefix("type ") {
                target_type = Some(ObjectType::try_from(rest)?);
            } else if let Some(rest) = line.strip_prefix("tag ") {
                name = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("tagger ") {
                tagger = Some(Author::try_from(rest)?);
            }
        }

        let missing = |field: &'static str| LitError::Corrupt {
            kind: "tag",
            detail: format!("missing {field} header"),
        };

        Ok(Tag::new(
            target.ok_or_else(|| missing("object"))?,
            target_type.ok_or_else(|| missing("type"))?,
            name.ok_or_else(|| missing("tag"))?,
            tagger.ok_or_else(|| missing("tagger"))?,
            message.to_string(),
        ))
    }
}

impl Object for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn display(&self) -> String {
        self.text()
    }
}
