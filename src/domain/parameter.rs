use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// A validated parameter name: non-empty and free of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParameterName(NonEmptyString);

impl ParameterName {
    /// Creates a new `ParameterName`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::EmptyName`] for an empty name and
    /// [`ParameterError::WhitespaceInName`] if the name contains any
    /// whitespace character.
    pub fn new(name: String) -> Result<Self, ParameterError> {
        if name.chars().any(char::is_whitespace) {
            return Err(ParameterError::WhitespaceInName(name));
        }
        NonEmptyString::new(name)
            .map(Self)
            .map_err(|_| ParameterError::EmptyName)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for ParameterName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterName {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// The declared type of a test-case parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Any text.
    String,
    /// A signed 64-bit integer.
    Int,
    /// A floating point number.
    Float,
    /// `true` or `false`.
    Bool,
    /// A JSON array, e.g. `[1, 2, 3]`.
    Array,
}

impl ParameterType {
    /// All parameter types, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::String,
        Self::Int,
        Self::Float,
        Self::Bool,
        Self::Array,
    ];

    /// The wire name of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Array => "array",
        }
    }

    /// Checks that `value` is a valid literal of this type.
    #[must_use]
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::String => true,
            Self::Int => value.trim().parse::<i64>().is_ok(),
            Self::Float => value.trim().parse::<f64>().is_ok(),
            Self::Bool => matches!(value.trim(), "true" | "false"),
            Self::Array => matches!(
                serde_json::from_str::<serde_json::Value>(value),
                Ok(serde_json::Value::Array(_))
            ),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParameterError::UnknownType(s.to_string()))
    }
}

/// A named, typed input to a test case.
///
/// A `Parameter` can only be built through [`Parameter::new`], so its value
/// always satisfies its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawParameter", into = "RawParameter")]
pub struct Parameter {
    name: ParameterName,
    kind: ParameterType,
    value: String,
}

impl Parameter {
    /// Creates a parameter, validating the name and the value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains whitespace, or if
    /// `value` is not a valid literal of `kind`.
    pub fn new(
        name: impl Into<String>,
        kind: ParameterType,
        value: impl Into<String>,
    ) -> Result<Self, ParameterError> {
        let name = ParameterName::new(name.into())?;
        let value = value.into();
        if !kind.accepts(&value) {
            return Err(ParameterError::InvalidValue {
                name: name.to_string(),
                kind,
                value,
            });
        }
        Ok(Self { name, kind, value })
    }

    /// The parameter name.
    #[must_use]
    pub const fn name(&self) -> &ParameterName {
        &self.name
    }

    /// The declared type.
    #[must_use]
    pub const fn kind(&self) -> ParameterType {
        self.kind
    }

    /// The value, as entered.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The JSON shape of a parameter: `{"name": .., "type": .., "value": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "type")]
    kind: ParameterType,
    #[serde(default)]
    value: String,
}

impl TryFrom<RawParameter> for Parameter {
    type Error = ParameterError;

    fn try_from(raw: RawParameter) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.kind, raw.value)
    }
}

impl From<Parameter> for RawParameter {
    fn from(parameter: Parameter) -> Self {
        Self {
            name: parameter.name.to_string(),
            kind: parameter.kind,
            value: parameter.value,
        }
    }
}

/// Decodes a JSON-encoded parameter list.
///
/// Empty or malformed input yields an empty list. Entries that fail
/// validation are dropped individually.
#[must_use]
pub fn parameters_from_json(json: &str) -> Vec<Parameter> {
    if json.trim().is_empty() {
        return Vec::new();
    }

    let Ok(entries) = serde_json::from_str::<Vec<serde_json::Value>>(json) else {
        tracing::warn!("ignoring malformed parameter list");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Parameter>(entry) {
            Ok(parameter) => Some(parameter),
            Err(e) => {
                tracing::warn!("dropping invalid parameter: {e}");
                None
            }
        })
        .collect()
}

/// Encodes a parameter list as a JSON array.
#[must_use]
pub fn parameters_to_json(parameters: &[Parameter]) -> String {
    let raw: Vec<RawParameter> = parameters.iter().cloned().map(RawParameter::from).collect();
    serde_json::to_string(&raw).unwrap_or_else(|_| String::from("[]"))
}

/// Errors raised when a parameter is entered with an invalid name or value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParameterError {
    /// The parameter name was empty.
    #[error("parameter name must not be empty")]
    EmptyName,
    /// The parameter name contained whitespace.
    #[error("parameter name '{0}' must not contain whitespace")]
    WhitespaceInName(String),
    /// The parameter type is not one of the supported types.
    #[error("unknown parameter type '{0}': expected one of string, int, float, bool, array")]
    UnknownType(String),
    /// The value does not satisfy the declared type.
    #[error("value '{value}' of parameter '{name}' is not a valid {kind}")]
    InvalidValue {
        /// Name of the offending parameter.
        name: String,
        /// The declared type.
        kind: ParameterType,
        /// The rejected value.
        value: String,
    },
}
