use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for a requirements workspace.
///
/// Stored as TOML in `.reqtree/config.toml` under the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The file, relative to the workspace root, the forest is kept in.
    forest_file: PathBuf,

    /// The project id written to the header of every ReqIF export.
    ///
    /// When unset, each export generates a fresh one.
    pub project_id: Option<String>,

    /// The tool identifier written to ReqIF headers.
    pub tool_id: String,

    /// The name given to the exported specification.
    pub specification_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forest_file: default_forest_file(),
            project_id: None,
            tool_id: default_tool_id(),
            specification_title: default_specification_title(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// The file the forest is kept in, relative to the workspace root.
    #[must_use]
    pub fn forest_file(&self) -> &Path {
        &self.forest_file
    }

    /// Sets the file the forest is kept in.
    ///
    /// The file extension selects the format (`.reqif` or `.csv`).
    pub fn set_forest_file(&mut self, path: impl Into<PathBuf>) {
        self.forest_file = path.into();
    }
}

/// Errors that can occur when loading or saving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    /// The config file is not valid TOML for this configuration.
    #[error("Failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
    /// The configuration could not be encoded.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// The config file could not be written.
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),
}

fn default_forest_file() -> PathBuf {
    PathBuf::from("requirements.reqif")
}

fn default_tool_id() -> String {
    String::from("reqtree")
}

fn default_specification_title() -> String {
    String::from("Requirements")
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_forest_file")]
        forest_file: PathBuf,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,

        #[serde(default = "default_tool_id")]
        tool_id: String,

        #[serde(default = "default_specification_title")]
        specification_title: String,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                forest_file,
                project_id,
                tool_id,
                specification_title,
            } => Self {
                forest_file,
                project_id,
                tool_id,
                specification_title,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            forest_file: config.forest_file,
            project_id: config.project_id,
            tool_id: config.tool_id,
            specification_title: config.specification_title,
        }
    }
}
