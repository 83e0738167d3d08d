//! Schema-less document model.
//!
//! A document payload is an arbitrary JSON object; key order carries no
//! meaning. Every successful write regenerates the `etag` and increments
//! `version` by exactly one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use super::query::FieldPath;
use super::TenantId;

/// JSON object stored as a document body.
pub type Payload = Map<String, Value>;

/// Maximum length of a collection name in characters.
pub const COLLECTION_NAME_MAX: usize = 100;

/// Validation errors raised when building document-store identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentValidationError {
    EmptyCollectionName,
    CollectionNameTooLong { max: usize },
    CollectionNameInvalidCharacters,
    InvalidDocumentId,
}

impl fmt::Display for DocumentValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCollectionName => write!(f, "collection name must not be empty"),
            Self::CollectionNameTooLong { max } => {
                write!(f, "collection name must be at most {max} characters")
            }
            Self::CollectionNameInvalidCharacters => {
                write!(f, "collection name must not contain '/' or control characters")
            }
            Self::InvalidDocumentId => write!(f, "document id must be a valid UUID"),
        }
    }
}

impl std::error::Error for DocumentValidationError {}

/// Tenant-unique collection name.
///
/// # Examples
/// ```
/// use backend::domain::CollectionName;
///
/// let name = CollectionName::new("notes").expect("valid name");
/// assert_eq!(name.as_ref(), "notes");
/// assert!(CollectionName::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Result<Self, DocumentValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DocumentValidationError::EmptyCollectionName);
        }
        if trimmed.chars().count() > COLLECTION_NAME_MAX {
            return Err(DocumentValidationError::CollectionNameTooLong {
                max: COLLECTION_NAME_MAX,
            });
        }
        if trimmed.chars().any(|ch| ch == '/' || ch.is_control()) {
            return Err(DocumentValidationError::CollectionNameInvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}

impl TryFrom<String> for CollectionName {
    type Error = DocumentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, format = Uuid)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::str::FromStr for DocumentId {
    type Err = DocumentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| DocumentValidationError::InvalidDocumentId)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Named grouping of documents inside one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Collection {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub project_id: TenantId,
    pub name: CollectionName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored document as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Document {
    pub id: DocumentId,
    #[schema(value_type = String, format = Uuid)]
    pub collection_id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub project_id: TenantId,
    #[schema(value_type = Object)]
    pub data: Payload,
    pub version: i64,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// New opaque concurrency token for a successful write.
    pub fn fresh_etag() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Keep only the named top-level payload fields.
    ///
    /// Identity and system columns are always retained. Unknown field names
    /// are ignored.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Document, DocumentId, FieldPath, TenantId};
    /// use chrono::Utc;
    /// use serde_json::json;
    ///
    /// let mut doc = Document {
    ///     id: DocumentId::random(),
    ///     collection_id: uuid::Uuid::new_v4(),
    ///     project_id: TenantId::random(),
    ///     data: json!({"title": "hi", "body": "long"}).as_object().cloned().expect("object"),
    ///     version: 1,
    ///     etag: "t".into(),
    ///     created_at: Utc::now(),
    ///     updated_at: Utc::now(),
    /// };
    /// doc = doc.project(&[FieldPath::new("title").expect("field")]);
    /// assert_eq!(doc.data.len(), 1);
    /// ```
    #[must_use]
    pub fn project(mut self, select: &[FieldPath]) -> Self {
        if select.is_empty() {
            return self;
        }
        self.data
            .retain(|key, _| select.iter().any(|field| field.as_ref() == key));
        self
    }
}

/// Result of a set or upsert: the stored document and whether it was new.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub document: Document,
    pub inserted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn sample(data: Value) -> Document {
        Document {
            id: DocumentId::random(),
            collection_id: Uuid::new_v4(),
            project_id: TenantId::random(),
            data: data.as_object().cloned().expect("object payload"),
            version: 3,
            etag: "etag".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case("", DocumentValidationError::EmptyCollectionName)]
    #[case("a/b", DocumentValidationError::CollectionNameInvalidCharacters)]
    fn rejects_bad_collection_names(#[case] raw: &str, #[case] expected: DocumentValidationError) {
        assert_eq!(CollectionName::new(raw), Err(expected));
    }

    #[rstest]
    fn rejects_overlong_collection_names() {
        let raw = "n".repeat(COLLECTION_NAME_MAX + 1);
        assert_eq!(
            CollectionName::new(raw),
            Err(DocumentValidationError::CollectionNameTooLong {
                max: COLLECTION_NAME_MAX
            })
        );
    }

    #[rstest]
    fn collection_names_are_trimmed() {
        let name = CollectionName::new("  notes ").expect("valid");
        assert_eq!(name.as_ref(), "notes");
    }

    #[rstest]
    fn projection_keeps_system_columns() {
        let doc = sample(json!({"a": 1, "b": 2, "c": 3}));
        let id = doc.id;
        let projected = doc.project(&[
            FieldPath::new("a").expect("field"),
            FieldPath::new("missing").expect("field"),
        ]);
        assert_eq!(Value::Object(projected.data), json!({"a": 1}));
        assert_eq!(projected.id, id);
        assert_eq!(projected.version, 3);
    }

    #[rstest]
    fn empty_projection_returns_everything() {
        let doc = sample(json!({"a": 1, "b": 2}));
        let projected = doc.clone().project(&[]);
        assert_eq!(projected, doc);
    }

    #[rstest]
    fn document_ids_reject_non_uuids() {
        assert_eq!(
            "abc".parse::<DocumentId>(),
            Err(DocumentValidationError::InvalidDocumentId)
        );
    }
}
