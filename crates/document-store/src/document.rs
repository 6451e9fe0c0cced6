use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Version number for a stored document, used for optimistic concurrency control.
///
/// A document that has never been stored is at version 0. The first insert
/// produces version 1 and every successful save increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a document that was never stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A JSON document together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The collection the document lives in (e.g. "trips").
    pub collection: String,

    /// The document key, unique within its collection.
    pub id: String,

    /// The stored version. Ignored on save; the store assigns the next one.
    pub version: Version,

    /// The document body.
    pub body: serde_json::Value,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates an unsaved document from a raw JSON body.
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            version: Version::initial(),
            body,
            updated_at: Utc::now(),
        }
    }

    /// Creates an unsaved document by serializing a value.
    pub fn from_value<T: Serialize>(
        collection: impl Into<String>,
        id: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(value)?))
    }

    /// Deserializes the document body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn document_from_value_and_decode() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Body {
            name: String,
        }

        let body = Body {
            name: "test".to_string(),
        };
        let doc = Document::from_value("things", "t-1", &body).unwrap();

        assert_eq!(doc.collection, "things");
        assert_eq!(doc.id, "t-1");
        assert_eq!(doc.version, Version::initial());
        assert_eq!(doc.body, serde_json::json!({"name": "test"}));
        assert_eq!(doc.decode::<Body>().unwrap(), body);
    }
}
