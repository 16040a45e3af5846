//! A workspace holding one forest on disk.
//!
//! The [`Session`] owns the [`Config`] and the [`Forest`] of a workspace
//! root. The forest lives in a single file whose extension selects its
//! format; imports from other files replace it only once they have been
//! read in full.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument, warn};

use crate::{
    domain::{Config, ConfigError, Forest, ForestError, Node, NodeId},
    storage::{
        csv::{CsvError, export_to_csv, import_from_csv},
        reqif::{ReqIfError, ReqIfExporter, import_from_reqif},
    },
};

/// The directory, relative to the workspace root, holding the configuration.
pub const CONFIG_DIR: &str = ".reqtree";

const CONFIG_FILE: &str = "config.toml";

/// An interchange format, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// ReqIF XML (`.reqif`).
    ReqIf,
    /// Flat CSV of Requirement nodes (`.csv`).
    Csv,
}

impl Format {
    /// The format of a file, from its extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("reqif") {
            Some(Self::ReqIf)
        } else if extension.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else {
            None
        }
    }

    /// The file extension, without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::ReqIf => "reqif",
            Self::Csv => "csv",
        }
    }
}

/// A forest and its configuration, rooted at a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    root: PathBuf,
    config: Config,
    forest: Forest,
}

impl Session {
    /// A session with an empty forest and the default configuration.
    ///
    /// Nothing is read from or written to `root` until [`Session::save`].
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: Config::default(),
            forest: Forest::default(),
        }
    }

    /// Creates the configuration directory of a new workspace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyInitialised`] if the workspace already
    /// has a configuration, or an error if it cannot be written.
    #[instrument(level = "debug")]
    pub fn init(root: PathBuf) -> Result<Self, SessionError> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Err(SessionError::AlreadyInitialised(root));
        }

        let session = Self::new(root);
        session.save_config()?;
        info!("Initialised workspace at {}", session.root.display());
        Ok(session)
    }

    /// Opens the workspace at `root`.
    ///
    /// A missing configuration yields the defaults, and a missing forest file
    /// an empty forest.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is malformed, or if the forest
    /// file exists but cannot be read or parsed. A forest file that is XML
    /// but not a ReqIF forest gives [`SessionError::NotAForest`], so that a
    /// later [`Session::save`] cannot overwrite it.
    #[instrument(level = "debug")]
    pub fn open(root: PathBuf) -> Result<Self, SessionError> {
        let config = load_config(&root)?;
        let mut session = Self {
            root,
            config,
            forest: Forest::default(),
        };

        let path = session.forest_path();
        if path.exists() {
            session.forest = read_forest(&path)?;
            session.forest.assign_levels();
        } else {
            debug!("no forest file at {}, starting empty", path.display());
        }
        Ok(session)
    }

    /// Writes the configuration and the forest back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn save(&self) -> Result<(), SessionError> {
        self.save_config()?;
        self.export_to_path(&self.forest_path())
    }

    fn save_config(&self) -> Result<(), SessionError> {
        let dir = self.root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).map_err(|source| SessionError::Io {
            path: dir.clone(),
            source,
        })?;
        self.config.save(&dir.join(CONFIG_FILE))?;
        Ok(())
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path of the forest file.
    #[must_use]
    pub fn forest_path(&self) -> PathBuf {
        self.root.join(self.config.forest_file())
    }

    /// The forest, with levels assigned.
    #[must_use]
    pub const fn forest(&self) -> &Forest {
        &self.forest
    }

    /// The workspace configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the workspace configuration.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Adds a node under `parent`, or as a new root, and reassigns levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist or the node's id is
    /// already taken.
    #[instrument(level = "debug", skip(self, node), fields(id = %node.id()))]
    pub fn add(&mut self, parent: Option<&str>, node: Node) -> Result<NodeId, SessionError> {
        let id = self.forest.push(parent, node)?;
        self.forest.assign_levels();
        info!("Added {id}");
        Ok(id)
    }

    /// Mutable access to a node's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if there is no such node.
    pub fn node_mut(&mut self, id: &str) -> Result<&mut Node, SessionError> {
        self.forest
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(NodeId::from(id)))
    }

    /// Removes a node and its descendants, returning them in pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if there is no such node.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<Vec<Node>, SessionError> {
        let removed = self
            .forest
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(NodeId::from(id)))?;
        self.forest.assign_levels();
        info!("Deleted {id} and {} descendant(s)", removed.len() - 1);
        Ok(removed)
    }

    /// Moves a node under a new parent, or to the roots.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing or the move would create a
    /// cycle.
    pub fn move_node(&mut self, id: &str, parent: Option<&str>) -> Result<(), SessionError> {
        self.forest.move_node(id, parent)?;
        self.forest.assign_levels();
        Ok(())
    }

    /// Renders the forest as ReqIF, using the configured header values.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn export_reqif(&self) -> Result<String, SessionError> {
        let exporter = ReqIfExporter::new()
            .project_id(self.config.project_id.clone().unwrap_or_default())
            .tool_id(self.config.tool_id.clone())
            .title(self.config.specification_title.clone());
        Ok(exporter.export(&self.forest)?)
    }

    /// Replaces the forest with one read from a ReqIF document, returning the
    /// number of nodes imported.
    ///
    /// A document without spec-objects or specifications is treated as
    /// holding no requirements: the forest is left as it is and `0` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not well-formed, in which case
    /// the forest is left as it is.
    #[instrument(level = "debug", skip_all)]
    pub fn import_reqif(&mut self, xml: &str) -> Result<usize, SessionError> {
        match import_from_reqif(xml) {
            Ok(forest) => Ok(self.replace(forest)),
            Err(e) if e.is_schema_gap() => {
                warn!("no requirements found: {e}");
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Renders the Requirement nodes of the forest as CSV.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    pub fn export_csv(&self) -> Result<String, SessionError> {
        Ok(export_to_csv(&self.forest)?)
    }

    /// Replaces the forest with the Requirements read from a CSV table,
    /// returning the number of nodes imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the header does not match, in which case the
    /// forest is left as it is.
    #[instrument(level = "debug", skip_all)]
    pub fn import_csv(&mut self, text: &str) -> Result<usize, SessionError> {
        let forest = import_from_csv(text)?;
        Ok(self.replace(forest))
    }

    fn replace(&mut self, forest: Forest) -> usize {
        let count = forest.len();
        self.forest = forest;
        self.forest.assign_levels();
        info!("Imported {count} node(s)");
        count
    }

    /// Writes the forest to `path` in the format its extension names.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognised or the file
    /// cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn export_to_path(&self, path: &Path) -> Result<(), SessionError> {
        let content = match format_of(path)? {
            Format::ReqIf => self.export_reqif()?,
            Format::Csv => self.export_csv()?,
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SessionError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replaces the forest with one read from `path`, in the format its
    /// extension names. Returns the number of nodes imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognised, or the file
    /// cannot be read or parsed.
    #[instrument(level = "debug", skip(self))]
    pub fn import_from_path(&mut self, path: &Path) -> Result<usize, SessionError> {
        let format = format_of(path)?;
        let content = read_file(path)?;

        match format {
            Format::ReqIf => self.import_reqif(&content),
            Format::Csv => self.import_csv(&content),
        }
    }
}

fn format_of(path: &Path) -> Result<Format, SessionError> {
    Format::from_path(path).ok_or_else(|| SessionError::UnsupportedExtension(path.to_path_buf()))
}

fn read_file(path: &Path) -> Result<String, SessionError> {
    fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the workspace's own forest file, where a schema gap is an error.
fn read_forest(path: &Path) -> Result<Forest, SessionError> {
    let format = format_of(path)?;
    let content = read_file(path)?;

    match format {
        Format::ReqIf => import_from_reqif(&content).map_err(|source| {
            if source.is_schema_gap() {
                SessionError::NotAForest {
                    path: path.to_path_buf(),
                    source,
                }
            } else {
                source.into()
            }
        }),
        Format::Csv => Ok(import_from_csv(&content)?),
    }
}

fn load_config(root: &Path) -> Result<Config, SessionError> {
    let path = root.join(CONFIG_DIR).join(CONFIG_FILE);
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    Ok(Config::load(&path)?)
}

/// Errors raised by [`Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A file could not be read or written.
    #[error("{}: {source}", .path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// A ReqIF document could not be read or written.
    #[error(transparent)]
    ReqIf(#[from] ReqIfError),
    /// A CSV table could not be read or written.
    #[error(transparent)]
    Csv(#[from] CsvError),
    /// A structural change to the forest was rejected.
    #[error(transparent)]
    Forest(#[from] ForestError),
    /// No node has the given id.
    #[error("no node with id '{0}'")]
    NotFound(NodeId),
    /// The file extension names no known format.
    #[error("unsupported file extension: {} (expected .reqif or .csv)", .0.display())]
    UnsupportedExtension(PathBuf),
    /// The workspace already has a configuration.
    #[error("a workspace already exists at {}", .0.display())]
    AlreadyInitialised(PathBuf),
    /// The forest file is XML but holds no ReqIF forest.
    #[error("{} does not hold a forest: {source}", .path.display())]
    NotAForest {
        /// The forest file.
        path: PathBuf,
        /// The missing section.
        source: ReqIfError,
    },
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::domain::{Priority, Requirement, TestCase};

    fn setup_temp_session() -> (TempDir, Session) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let session = Session::init(tmp.path().to_path_buf()).unwrap();
        (tmp, session)
    }

    fn populate(session: &mut Session) -> (NodeId, NodeId) {
        let requirement = session.add(None, Node::requirement("Login")).unwrap();
        let case = session
            .add(
                Some(requirement.as_str()),
                Node::test_case("Login success").with_description("happy path"),
            )
            .unwrap();
        (requirement, case)
    }

    #[test_case("forest.reqif" => Some(Format::ReqIf))]
    #[test_case("FOREST.ReqIF" => Some(Format::ReqIf))]
    #[test_case("dir/table.csv" => Some(Format::Csv))]
    #[test_case("notes.txt" => None)]
    #[test_case("no_extension" => None)]
    fn format_from_extension(path: &str) -> Option<Format> {
        Format::from_path(Path::new(path))
    }

    #[test]
    fn extension_names_its_format() {
        for format in [Format::ReqIf, Format::Csv] {
            let path = PathBuf::from(format!("forest.{}", format.extension()));
            assert_eq!(Format::from_path(&path), Some(format));
        }
    }

    #[test]
    fn init_refuses_existing_workspace() {
        let (tmp, _session) = setup_temp_session();
        let err = Session::init(tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyInitialised(_)));
    }

    #[test]
    fn open_without_files_is_empty() {
        let tmp = TempDir::new().unwrap();
        let session = Session::open(tmp.path().to_path_buf()).unwrap();
        assert!(session.forest().is_empty());
        assert_eq!(session.config(), &Config::default());
    }

    #[test]
    fn add_assigns_levels() {
        let (_tmp, mut session) = setup_temp_session();
        let (requirement, case) = populate(&mut session);

        assert_eq!(session.forest().level(requirement.as_str()), Some("1"));
        assert_eq!(session.forest().level(case.as_str()), Some("1.1"));
    }

    #[test]
    fn add_under_missing_parent_fails() {
        let (_tmp, mut session) = setup_temp_session();
        let err = session.add(Some("ghost"), Node::test("Orphan")).unwrap_err();
        assert!(matches!(err, SessionError::Forest(ForestError::NotFound(_))));
    }

    #[test]
    fn save_then_open_restores_the_forest() {
        let (tmp, mut session) = setup_temp_session();
        let (requirement, case) = populate(&mut session);
        session
            .node_mut(case.as_str())
            .unwrap()
            .as_test_case_mut()
            .unwrap()
            .steps = vec!["open app".into(), "enter credentials".into()];
        session.config_mut().project_id = Some("project-1".into());
        session.save().unwrap();

        let reopened = Session::open(tmp.path().to_path_buf()).unwrap();
        assert_eq!(reopened.forest(), session.forest());
        assert_eq!(reopened.config().project_id.as_deref(), Some("project-1"));
        assert_eq!(reopened.forest().parent(case.as_str()), Some(&requirement));
    }

    #[test]
    fn open_refuses_a_forest_file_without_a_forest() {
        let (tmp, session) = setup_temp_session();
        let path = session.forest_path();
        let content = "<REQ-IF><THE-HEADER/></REQ-IF>";
        fs::write(&path, content).unwrap();

        let err = Session::open(tmp.path().to_path_buf()).unwrap_err();

        assert!(matches!(err, SessionError::NotAForest { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn open_rejects_a_malformed_forest_file() {
        let (tmp, session) = setup_temp_session();
        fs::write(session.forest_path(), "<REQ-IF><unclosed>").unwrap();

        let err = Session::open(tmp.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, SessionError::ReqIf(_)));
    }

    #[test]
    fn an_empty_forest_reopens() {
        let (tmp, session) = setup_temp_session();
        session.save().unwrap();

        let reopened = Session::open(tmp.path().to_path_buf()).unwrap();
        assert!(reopened.forest().is_empty());
    }

    #[test]
    fn delete_removes_subtree() {
        let (_tmp, mut session) = setup_temp_session();
        let (requirement, case) = populate(&mut session);

        let removed = session.delete(requirement.as_str()).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!session.forest().contains(case.as_str()));
        assert!(matches!(
            session.delete(requirement.as_str()),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn move_node_reassigns_levels() {
        let (_tmp, mut session) = setup_temp_session();
        let (requirement, case) = populate(&mut session);

        session.move_node(case.as_str(), None).unwrap();

        assert_eq!(session.forest().level(case.as_str()), Some("2"));
        assert!(session.move_node(requirement.as_str(), Some(requirement.as_str())).is_err());
    }

    #[test]
    fn malformed_reqif_leaves_forest_untouched() {
        let (_tmp, mut session) = setup_temp_session();
        populate(&mut session);
        let before = session.forest().clone();

        assert!(session.import_reqif("<REQ-IF><unclosed>").is_err());
        assert_eq!(session.forest(), &before);
    }

    #[test]
    fn schema_gap_reports_nothing_imported() {
        let (_tmp, mut session) = setup_temp_session();
        populate(&mut session);
        let before = session.forest().clone();

        let count = session.import_reqif("<REQ-IF><THE-HEADER/></REQ-IF>").unwrap();

        assert_eq!(count, 0);
        assert_eq!(session.forest(), &before);
    }

    #[test]
    fn csv_header_mismatch_leaves_forest_untouched() {
        let (_tmp, mut session) = setup_temp_session();
        populate(&mut session);
        let before = session.forest().clone();

        assert!(matches!(
            session.import_csv("id,name\n"),
            Err(SessionError::Csv(CsvError::HeaderMismatch(_)))
        ));
        assert_eq!(session.forest(), &before);
    }

    #[test]
    fn csv_export_and_import_through_files() {
        let (tmp, mut session) = setup_temp_session();
        let mut node = Node::requirement("Login").with_description("Users can log in");
        node.as_requirement_mut().unwrap().priority = Priority::High;
        let requirement = session.add(None, node).unwrap();
        populate(&mut session);

        let path = tmp.path().join("out").join("table.csv");
        session.export_to_path(&path).unwrap();

        let mut other = Session::new(tmp.path().to_path_buf());
        let count = other.import_from_path(&path).unwrap();

        assert_eq!(count, 2);
        let imported = other.forest().get(requirement.as_str()).unwrap();
        assert_eq!(imported.description, "Users can log in");
        assert_eq!(
            imported.as_requirement(),
            Some(&Requirement {
                priority: Priority::High,
                ..Requirement::default()
            })
        );
    }

    #[test]
    fn reqif_export_uses_configured_header() {
        let (_tmp, mut session) = setup_temp_session();
        session.config_mut().project_id = Some("stable-project".into());
        session.config_mut().specification_title = "Payments".into();

        let xml = session.export_reqif().unwrap();

        assert!(xml.contains("<PROJECT-ID>stable-project</PROJECT-ID>"));
        assert!(xml.contains(r#"LONG-NAME="Payments""#));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let (tmp, mut session) = setup_temp_session();
        let path = tmp.path().join("forest.json");

        assert!(matches!(
            session.export_to_path(&path),
            Err(SessionError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            session.import_from_path(&path),
            Err(SessionError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_case_fields_survive_reopen() {
        let (tmp, mut session) = setup_temp_session();
        let case = session
            .add(
                None,
                Node::with_id(
                    NodeId::from("tc"),
                    "Case",
                    crate::domain::NodeKind::TestCase(TestCase {
                        scenario: "Scenario".into(),
                        expected_results: vec!["ok".into()],
                        ..TestCase::default()
                    }),
                ),
            )
            .unwrap();
        session.save().unwrap();

        let reopened = Session::open(tmp.path().to_path_buf()).unwrap();
        let test_case = reopened.forest().get(case.as_str()).unwrap().as_test_case().unwrap();
        assert_eq!(test_case.scenario, "Scenario");
        assert_eq!(test_case.expected_results, ["ok"]);
    }
}
