//! Hierarchical requirements, tests and test cases, with ReqIF and CSV
//! interchange.
//!
//! The [`Forest`] owns a set of [`Node`] trees. It can be written to and read
//! back from a ReqIF XML document without loss, or flattened to a CSV table
//! of its Requirement nodes. A [`Session`] ties a forest to a workspace
//! directory and its [`Config`].

pub mod domain;
pub use domain::{
    Config, Forest, ForestError, Node, NodeId, NodeKind, Parameter, ParameterType, Priority,
    Requirement, Status, TestCase, TypeTag,
};

/// Interchange formats and on-disk workspaces.
pub mod storage;
pub use storage::{
    CsvError, Format, ReqIfError, ReqIfExporter, Session, SessionError, export_to_csv,
    export_to_reqif, import_from_csv, import_from_reqif,
};
