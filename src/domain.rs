//! Domain models for the requirements forest.
//!
//! This module contains the node variants, the forest that owns them, typed
//! test-case parameters, identifiers and configuration.

mod config;
pub use config::{Config, ConfigError};

/// Node identifiers.
pub mod id;
pub use id::NodeId;

/// Node variants and their attributes.
pub mod node;
pub use node::{
    DEFAULT_DESCRIPTION, ExtraValue, Node, NodeKind, Priority, Requirement, Status, TestCase,
    TypeTag, UnknownValue,
};

/// Typed test-case parameters and their validation.
pub mod parameter;
pub use parameter::{Parameter, ParameterError, ParameterName, ParameterType};

pub mod forest;
pub use forest::{Forest, ForestError};
