use crate::errors::LitError;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Consume the `<type> <length>\0` header from a reader, returning the
    /// type and the declared payload length.
    pub fn parse_header(data_reader: &mut impl BufRead) -> anyhow::Result<(ObjectType, usize)> {
        let mut object_type = Vec::new();
        data_reader.read_until(b' ', &mut object_type)?;

        let object_type = String::from_utf8(object_type).map_err(|_| LitError::Corrupt {
            kind: "object",
            detail: "non-utf8 type in header".to_string(),
        })?;
        let object_type = ObjectType::try_from(object_type.trim())?;

        let mut size = Vec::new();
        data_reader.read_until(b'\0', &mut size)?;
        if size.pop() != Some(b'\0') {
            return Err(LitError::Corrupt {
                kind: "object",
                detail: "missing NUL after length".to_string(),
            }
            .into());
        }

        let size = std::str::from_utf8(&size)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| LitError::Corrupt {
                kind: "object",
                detail: "invalid length in header".to_string(),
            })?;

        Ok((object_type, size))
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> anyhow::Result<Self> {
        match value {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            other => Err(LitError::Corrupt {
                kind: "object",
                detail: format!("unknown object type {other:?}"),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_parses_type_and_length() {
        let mut reader = Cursor::new(b"blob 11\0hello world".to_vec());
        let (object_type, size) = ObjectType::parse_header(&mut reader).unwrap();
        assert_eq!(object_type, ObjectType::Blob);
        assert_eq!(size, 11);
    }

    #[test]
    fn header_rejects_unknown_type() {
        let mut reader = Cursor::new(b"blub 3\0abc".to_vec());
        assert!(ObjectType::parse_header(&mut reader).is_err());
    }
}
