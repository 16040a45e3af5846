use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::{NodeId, Parameter};

/// The description given to nodes created without one.
pub const DEFAULT_DESCRIPTION: &str = "No description";

/// A single entry in the requirements forest.
///
/// The node carries its own content only. Its position in the forest
/// (parent, children, level) is owned by the [`Forest`](crate::Forest).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    /// The display name.
    pub label: String,
    /// Free text describing the node.
    pub description: String,
    /// The variant and its variant-specific attributes.
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node with a freshly generated identifier.
    #[must_use]
    pub fn new(label: impl Into<String>, kind: NodeKind) -> Self {
        Self::with_id(NodeId::generate(), label, kind)
    }

    /// Creates a node with a known identifier.
    #[must_use]
    pub fn with_id(id: NodeId, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            label: label.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
            kind,
        }
    }

    /// Creates a [`NodeKind::Requirement`] with default priority and status.
    #[must_use]
    pub fn requirement(label: impl Into<String>) -> Self {
        Self::new(label, NodeKind::Requirement(Requirement::default()))
    }

    /// Creates a [`NodeKind::Test`].
    #[must_use]
    pub fn test(label: impl Into<String>) -> Self {
        Self::new(label, NodeKind::Test)
    }

    /// Creates an empty [`NodeKind::TestCase`].
    #[must_use]
    pub fn test_case(label: impl Into<String>) -> Self {
        Self::new(label, NodeKind::TestCase(TestCase::default()))
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The stable identifier of this node.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// The variant discriminator.
    #[must_use]
    pub const fn type_tag(&self) -> TypeTag {
        self.kind.type_tag()
    }

    /// The requirement attributes, if this is a requirement.
    #[must_use]
    pub const fn as_requirement(&self) -> Option<&Requirement> {
        match &self.kind {
            NodeKind::Requirement(requirement) => Some(requirement),
            _ => None,
        }
    }

    /// Mutable access to the requirement attributes.
    pub const fn as_requirement_mut(&mut self) -> Option<&mut Requirement> {
        match &mut self.kind {
            NodeKind::Requirement(requirement) => Some(requirement),
            _ => None,
        }
    }

    /// The test-case attributes, if this is a test case.
    #[must_use]
    pub const fn as_test_case(&self) -> Option<&TestCase> {
        match &self.kind {
            NodeKind::TestCase(test_case) => Some(test_case),
            _ => None,
        }
    }

    /// Mutable access to the test-case attributes.
    pub const fn as_test_case_mut(&mut self) -> Option<&mut TestCase> {
        match &mut self.kind {
            NodeKind::TestCase(test_case) => Some(test_case),
            _ => None,
        }
    }
}

/// The node variants and their variant-specific attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A requirement.
    Requirement(Requirement),
    /// A test grouping test cases. It has no attributes of its own.
    Test,
    /// An executable test case.
    TestCase(TestCase),
    /// A node whose type could not be classified, with its raw attributes.
    Unknown(BTreeMap<String, String>),
}

impl NodeKind {
    /// The discriminator of this variant.
    #[must_use]
    pub const fn type_tag(&self) -> TypeTag {
        match self {
            Self::Requirement(_) => TypeTag::Requirement,
            Self::Test => TypeTag::Test,
            Self::TestCase(_) => TypeTag::TestCase,
            Self::Unknown(_) => TypeTag::Unknown,
        }
    }
}

/// Discriminates the node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    /// See [`NodeKind::Requirement`].
    Requirement,
    /// See [`NodeKind::Test`].
    Test,
    /// See [`NodeKind::TestCase`].
    TestCase,
    /// See [`NodeKind::Unknown`].
    Unknown,
}

impl TypeTag {
    /// The tag as written to interchange documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requirement => "requirement",
            Self::Test => "test",
            Self::TestCase => "testCase",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes specific to a requirement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement {
    /// How important the requirement is.
    pub priority: Priority,
    /// Where the requirement is in its review lifecycle.
    pub status: Status,
    /// Open-ended extension data. Each value remembers its type.
    pub other_data: BTreeMap<String, ExtraValue>,
}

/// A value in a requirement's extension data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    /// A boolean flag.
    Boolean(bool),
    /// A number.
    Number(f64),
    /// Free text.
    String(String),
}

impl fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

/// Attributes specific to a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    /// The scenario under test.
    pub scenario: String,
    /// Ordered steps to execute.
    pub steps: Vec<String>,
    /// Conditions that must hold before the steps run.
    pub prerequisites: Vec<String>,
    /// Inputs used by the steps.
    pub test_data: Vec<String>,
    /// Observable outcomes expected after the steps.
    pub expected_results: Vec<String>,
    /// Typed parameters.
    pub parameters: Vec<Parameter>,
}

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $error:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All values, in order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The display name, as written to interchange documents.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| UnknownValue {
                        field: $error,
                        value: s.to_string(),
                    })
            }
        }
    };
}

named_enum! {
    /// How important a requirement is.
    Priority, "priority" {
        /// Must be addressed first.
        High => "High",
        /// The default priority.
        #[default]
        Medium => "Medium",
        /// Can be deferred.
        Low => "Low",
    }
}

named_enum! {
    /// The review lifecycle of a requirement.
    Status, "status" {
        /// Being written.
        #[default]
        Draft => "Draft",
        /// Ready for review.
        Ready => "Ready",
        /// Reviewed, awaiting approval.
        Reviewed => "Reviewed",
        /// Approved for implementation.
        Approved => "Approved",
        /// Shipped.
        Released => "Released",
    }
}

/// A priority or status value that is not one of the known names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} '{value}'")]
pub struct UnknownValue {
    field: &'static str,
    value: String,
}
