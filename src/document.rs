//! Document identity
//!
//! A document is identified by an opaque id handed over by the persistence
//! layer. The id doubles as a directory name inside the artifact store, so it
//! is restricted to a single safe path component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum accepted id length
const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentIdError {
    #[error("Document id cannot be empty")]
    Empty,

    #[error("Document id is too long ({0} characters, max {MAX_ID_LEN})")]
    TooLong(usize),

    #[error("Document id contains invalid characters: {0:?}")]
    InvalidCharacters(String),
}

/// Identifier of a document, safe to use as a path component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, DocumentIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DocumentIdError::Empty);
        }
        if id.len() > MAX_ID_LEN {
            return Err(DocumentIdError::TooLong(id.len()));
        }
        let valid = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !id.starts_with('-');
        if !valid {
            return Err(DocumentIdError::InvalidCharacters(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DocumentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_id() {
        let id = DocumentId::from(42);
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_valid_ids() {
        assert!(DocumentId::new("notebook_7").is_ok());
        assert!(DocumentId::new("a-b-c").is_ok());
    }

    #[test]
    fn test_rejects_path_components() {
        assert!(matches!(
            DocumentId::new("../etc"),
            Err(DocumentIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            DocumentId::new("a/b"),
            Err(DocumentIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            DocumentId::new(".hidden"),
            Err(DocumentIdError::InvalidCharacters(_))
        ));
        assert_eq!(DocumentId::new(""), Err(DocumentIdError::Empty));
    }

    #[test]
    fn test_rejects_overlong_id() {
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert_eq!(
            DocumentId::new(long),
            Err(DocumentIdError::TooLong(MAX_ID_LEN + 1))
        );
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let id: DocumentId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(id, DocumentId::from(17));
        assert!(serde_json::from_str::<DocumentId>("\"../x\"").is_err());
    }
}
