use std::{borrow::Borrow, fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stable identifier of a node in the forest.
///
/// Identifiers are assigned once, when a node is created, and survive every
/// edit. Identifiers read from an interchange document are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generates a fresh identifier.
    ///
    /// Identifiers are random (v4) UUIDs in their hyphenated form, so they
    /// never repeat within a process and are safe to embed in an XML
    /// attribute or a CSV field.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier, as read from a document.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::NodeId;

    #[test]
    fn generated_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| NodeId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn generated_ids_are_safe_for_csv_and_xml() {
        let id = NodeId::generate();
        assert!(
            !id.as_str()
                .contains(|c: char| matches!(c, ',' | '\n' | '\r' | '"' | '<' | '&'))
        );
    }

    #[test]
    fn imported_ids_are_kept_verbatim() {
        let id = NodeId::from("r1");
        assert_eq!(id.as_str(), "r1");
        assert_eq!(id.to_string(), "r1");
    }
}
