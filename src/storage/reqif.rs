//! ReqIF interchange.
//!
//! Only the subset of ReqIF this crate writes is understood: string
//! attribute definitions on three spec-object types, a flat list of
//! spec-objects, and one or more specifications whose hierarchy mirrors the
//! forest.

mod export;
mod import;
mod xml;

pub use export::{ReqIfExporter, export_to_reqif};
pub use import::import_from_reqif;

use crate::domain::TypeTag;

/// Identifier of the string datatype every attribute definition uses.
pub const STRING_DATATYPE: &str = "_StringType";

/// Identifier of the rich-text datatype.
pub const XHTML_DATATYPE: &str = "_XhtmlType";

/// Identifier of the specification type.
pub const SPECIFICATION_TYPE: &str = "_SpecificationType";

/// The spec-object types this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecObjectType {
    /// `_RequirementType`
    Requirement,
    /// `_TestType`
    Test,
    /// `_TestCaseType`
    TestCase,
}

impl SpecObjectType {
    /// Every known spec-object type, in the order they are declared.
    pub const ALL: [Self; 3] = [Self::Requirement, Self::Test, Self::TestCase];

    /// The `IDENTIFIER` of the type declaration.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Requirement => "_RequirementType",
            Self::Test => "_TestType",
            Self::TestCase => "_TestCaseType",
        }
    }

    /// Human-readable `LONG-NAME`.
    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::Test => "Test",
            Self::TestCase => "Test Case",
        }
    }

    /// The attributes a spec-object of this type carries, in order.
    #[must_use]
    pub const fn attributes(self) -> &'static [AttributeDefinition] {
        use AttributeDefinition as A;
        match self {
            Self::Requirement => &[
                A::RequirementTitle,
                A::RequirementDescription,
                A::RequirementType,
                A::Priority,
                A::Status,
                A::RequirementOtherData,
            ],
            Self::Test => &[A::TestTitle, A::TestDescription, A::TestType],
            Self::TestCase => &[
                A::TestCaseTitle,
                A::TestCaseDescription,
                A::TestCaseType,
                A::Steps,
                A::Prerequisites,
                A::Parameters,
                A::Scenario,
                A::TestData,
                A::ExpectedResults,
            ],
        }
    }

    /// Resolves a `SPEC-OBJECT-TYPE-REF`.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.identifier() == identifier)
    }

    /// The spec-object type for a node variant. Unknown nodes have none.
    #[must_use]
    pub const fn for_tag(tag: TypeTag) -> Option<Self> {
        match tag {
            TypeTag::Requirement => Some(Self::Requirement),
            TypeTag::Test => Some(Self::Test),
            TypeTag::TestCase => Some(Self::TestCase),
            TypeTag::Unknown => None,
        }
    }

    /// The node variant built from spec-objects of this type.
    #[must_use]
    pub const fn type_tag(self) -> TypeTag {
        match self {
            Self::Requirement => TypeTag::Requirement,
            Self::Test => TypeTag::Test,
            Self::TestCase => TypeTag::TestCase,
        }
    }
}

/// A string attribute definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AttributeDefinition {
    RequirementTitle,
    RequirementDescription,
    RequirementType,
    Priority,
    Status,
    RequirementOtherData,
    TestTitle,
    TestDescription,
    TestType,
    TestCaseTitle,
    TestCaseDescription,
    TestCaseType,
    Steps,
    Prerequisites,
    Parameters,
    Scenario,
    TestData,
    ExpectedResults,
}

impl AttributeDefinition {
    /// The `IDENTIFIER` of the definition.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::RequirementTitle => "_Requirement_Title",
            Self::RequirementDescription => "_Requirement_Description",
            Self::RequirementType => "_Requirement_Type",
            Self::Priority => "_Priority",
            Self::Status => "_Status",
            Self::RequirementOtherData => "_Requirement_OtherData",
            Self::TestTitle => "_Test_Title",
            Self::TestDescription => "_Test_Description",
            Self::TestType => "_Test_Type",
            Self::TestCaseTitle => "_TestCase_Title",
            Self::TestCaseDescription => "_TestCase_Description",
            Self::TestCaseType => "_TestCase_Type",
            Self::Steps => "_Steps",
            Self::Prerequisites => "_Prerequisites",
            Self::Parameters => "_Parameters",
            Self::Scenario => "_Scenario",
            Self::TestData => "_TestData",
            Self::ExpectedResults => "_ExpectedResults",
        }
    }

    /// Human-readable `LONG-NAME`.
    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::RequirementTitle | Self::TestTitle | Self::TestCaseTitle => "Title",
            Self::RequirementDescription | Self::TestDescription | Self::TestCaseDescription => {
                "Description"
            }
            Self::RequirementType | Self::TestType | Self::TestCaseType => "Type",
            Self::Priority => "Priority",
            Self::Status => "Status",
            Self::RequirementOtherData => "Other Data",
            Self::Steps => "Steps",
            Self::Prerequisites => "Prerequisites",
            Self::Parameters => "Parameters",
            Self::Scenario => "Scenario",
            Self::TestData => "Test Data",
            Self::ExpectedResults => "Expected Results",
        }
    }

    /// Resolves an `ATTRIBUTE-DEFINITION-STRING-REF`.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        SpecObjectType::ALL
            .into_iter()
            .flat_map(SpecObjectType::attributes)
            .copied()
            .find(|definition| definition.identifier() == identifier)
    }
}

/// Errors raised while reading or writing ReqIF.
#[derive(Debug, thiserror::Error)]
pub enum ReqIfError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An element carries a malformed attribute.
    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    /// A tag or attribute name is not valid UTF-8.
    #[error("invalid UTF-8 in XML name: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    /// The document ended before this element was closed.
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    /// A closing tag has no matching opening tag.
    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),
    /// The document has no root element.
    #[error("document has no root element")]
    NoRoot,
    /// The document has more than one root element.
    #[error("unexpected second root element <{0}>")]
    MultipleRoots(String),
    /// A required section of the document is absent.
    ///
    /// This is a schema gap rather than a parse failure: callers should treat
    /// it as "no requirements found".
    #[error("document has no {0} section")]
    MissingSection(&'static str),
    /// The document could not be written.
    #[error("failed to write ReqIF: {0}")]
    Write(#[from] std::io::Error),
}

impl ReqIfError {
    /// Whether this error means the document is well-formed but lacks an
    /// expected section.
    #[must_use]
    pub const fn is_schema_gap(&self) -> bool {
        matches!(self, Self::MissingSection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_identifiers_are_unique_and_resolvable() {
        let definitions: Vec<_> = SpecObjectType::ALL
            .into_iter()
            .flat_map(SpecObjectType::attributes)
            .copied()
            .collect();
        for definition in &definitions {
            assert_eq!(
                AttributeDefinition::from_identifier(definition.identifier()),
                Some(*definition)
            );
        }
        let mut identifiers: Vec<_> = definitions.iter().map(|d| d.identifier()).collect();
        identifiers.sort_unstable();
        identifiers.dedup();
        assert_eq!(identifiers.len(), definitions.len());
    }

    #[test]
    fn spec_object_types_map_to_tags() {
        for kind in SpecObjectType::ALL {
            assert_eq!(SpecObjectType::for_tag(kind.type_tag()), Some(kind));
            assert_eq!(SpecObjectType::from_identifier(kind.identifier()), Some(kind));
        }
        assert_eq!(SpecObjectType::for_tag(TypeTag::Unknown), None);
        assert_eq!(SpecObjectType::from_identifier("_BogusType"), None);
    }
}
