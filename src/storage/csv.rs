//! Flat CSV interchange for Requirement nodes.
//!
//! The table has a fixed header and one row per Requirement, with the parent
//! linkage carried in the `ParentID` column. Values are written as-is: a
//! value containing a comma or a line break does not survive a round trip.

use std::collections::{HashMap, HashSet, VecDeque};

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use tracing::{debug, instrument, warn};

use crate::domain::{Forest, Node, NodeId, NodeKind, Priority, Requirement, TypeTag};

/// The header row, column by column.
pub const CSV_HEADER: [&str; 6] = ["ID", "Name", "Description", "Priority", "Type", "ParentID"];

/// Errors raised while reading or writing CSV.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// The first line is not the expected header.
    #[error("unexpected CSV header '{0}', expected '{header}'", header = CSV_HEADER.join(","))]
    HeaderMismatch(String),
    /// The table could not be read or written.
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    /// The output buffer could not be flushed.
    #[error("failed to write CSV: {0}")]
    Io(#[from] std::io::Error),
    /// The output is not valid UTF-8.
    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Writes the Requirement nodes of a forest as a CSV table, in pre-order.
///
/// Test and test-case nodes are omitted. A Requirement nested under one of
/// them takes its nearest Requirement ancestor as its parent.
///
/// # Errors
///
/// Returns an error only if the in-memory writer fails.
#[instrument(level = "debug", skip_all, fields(nodes = forest.len()))]
pub fn export_to_csv(forest: &Forest) -> Result<String, CsvError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;

    let mut rows = 0_usize;
    for (node, _) in forest.iter() {
        let Some(requirement) = node.as_requirement() else {
            continue;
        };
        let parent = requirement_ancestor(forest, node.id());
        writer.write_record([
            node.id().as_str(),
            node.label.as_str(),
            node.description.as_str(),
            requirement.priority.as_str(),
            TypeTag::Requirement.as_str(),
            parent.map_or("", NodeId::as_str),
        ])?;
        rows += 1;
    }
    debug!(rows, "wrote CSV");

    let bytes = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    Ok(String::from_utf8(bytes)?)
}

fn requirement_ancestor<'a>(forest: &'a Forest, id: &NodeId) -> Option<&'a NodeId> {
    let mut current = forest.parent(id.as_str());
    while let Some(parent) = current {
        if forest
            .get(parent.as_str())
            .is_some_and(|node| node.type_tag() == TypeTag::Requirement)
        {
            return Some(parent);
        }
        current = forest.parent(parent.as_str());
    }
    None
}

/// One Requirement row, before it is placed in the forest.
#[derive(Debug)]
struct Row {
    id: String,
    name: String,
    description: String,
    priority: Priority,
    parent: String,
}

impl Row {
    fn into_node(self) -> Node {
        Node::with_id(
            NodeId::new(self.id),
            self.name,
            NodeKind::Requirement(Requirement {
                priority: self.priority,
                ..Requirement::default()
            }),
        )
        .with_description(self.description)
    }
}

/// Reads a CSV table into a forest of Requirement nodes.
///
/// Fields are split on commas positionally. Rows of another type, rows
/// without an id and repeated ids are skipped. Rows are attached to their
/// parents regardless of the order they appear in; a row whose parent is
/// not in the table is dropped together with its descendants.
///
/// # Errors
///
/// Returns [`CsvError::HeaderMismatch`] if the first line is not exactly
/// the expected header, in which case nothing is imported.
#[instrument(level = "debug", skip_all, fields(bytes = text.len()))]
pub fn import_from_csv(text: &str) -> Result<Forest, CsvError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?;
    if !headers.iter().eq(CSV_HEADER) {
        return Err(CsvError::HeaderMismatch(
            headers.iter().collect::<Vec<_>>().join(","),
        ));
    }

    let mut seen = HashSet::new();
    let mut by_parent: HashMap<String, Vec<Row>> = HashMap::new();
    let mut total = 0_usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let raw = |index| record.get(index).unwrap_or_default();
        let field = |index| raw(index).trim();

        let kind = field(4);
        if !kind.eq_ignore_ascii_case(TypeTag::Requirement.as_str()) {
            debug!(line = line + 2, kind, "skipping non-requirement row");
            continue;
        }

        let id = field(0);
        if id.is_empty() {
            warn!(line = line + 2, "skipping row without an id");
            continue;
        }
        if !seen.insert(id.to_string()) {
            warn!(line = line + 2, id, "skipping row with a repeated id");
            continue;
        }

        let priority = match field(3) {
            "" => Priority::default(),
            value => value.parse().unwrap_or_else(|e| {
                warn!(line = line + 2, id, "{e}, using the default");
                Priority::default()
            }),
        };

        let row = Row {
            id: id.to_string(),
            name: raw(1).to_string(),
            description: raw(2).to_string(),
            priority,
            parent: field(5).to_string(),
        };
        by_parent.entry(row.parent.clone()).or_default().push(row);
        total += 1;
    }

    let mut forest = Forest::with_capacity(total);
    let mut queue = VecDeque::from([None::<NodeId>]);
    while let Some(parent) = queue.pop_front() {
        let key = parent.as_ref().map_or("", NodeId::as_str);
        for row in by_parent.remove(key).unwrap_or_default() {
            match forest.push(parent.as_ref().map(NodeId::as_str), row.into_node()) {
                Ok(id) => queue.push_back(Some(id)),
                Err(e) => warn!("skipping row: {e}"),
            }
        }
    }

    for (parent, rows) in &by_parent {
        for row in rows {
            warn!(id = %row.id, %parent, "dropping row whose parent is not in the table");
        }
    }

    forest.assign_levels();
    Ok(forest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;

    const HEADER: &str = "ID,Name,Description,Priority,Type,ParentID";

    fn requirement(id: &str, label: &str, priority: Priority) -> Node {
        Node::with_id(
            NodeId::from(id),
            label,
            NodeKind::Requirement(Requirement {
                priority,
                status: Status::Approved,
                ..Requirement::default()
            }),
        )
        .with_description(format!("{label} description"))
    }

    fn table(rows: &[&str]) -> String {
        let mut text = format!("{HEADER}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    fn mixed_forest() -> Forest {
        let mut forest = Forest::default();
        forest.push_root(requirement("r1", "Login", Priority::High)).unwrap();
        forest
            .push_child("r1", requirement("r2", "Password", Priority::Low))
            .unwrap();
        forest
            .push_child("r1", Node::with_id(NodeId::from("t1"), "Suite", NodeKind::Test))
            .unwrap();
        forest
            .push_child("t1", requirement("r3", "Nested", Priority::Medium))
            .unwrap();
        forest.push_child("t1", Node::test_case("Case")).unwrap();
        forest.push_root(requirement("r4", "Logout", Priority::Medium)).unwrap();
        forest
    }

    #[test]
    fn exports_requirement_rows_in_pre_order() {
        let csv = export_to_csv(&mixed_forest()).unwrap();

        let expected = [
            HEADER,
            "r1,Login,Login description,High,requirement,",
            "r2,Password,Password description,Low,requirement,r1",
            "r3,Nested,Nested description,Medium,requirement,r1",
            "r4,Logout,Logout description,Medium,requirement,",
        ];
        assert_eq!(csv.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn empty_forest_exports_header_only() {
        let csv = export_to_csv(&Forest::default()).unwrap();
        assert_eq!(csv, format!("{HEADER}\n"));
    }

    #[test]
    fn reimport_keeps_only_requirements() {
        let forest = import_from_csv(&export_to_csv(&mixed_forest()).unwrap()).unwrap();

        assert_eq!(forest.len(), 4);
        assert_eq!(forest.roots(), ["r1", "r4"].map(NodeId::from));
        assert_eq!(forest.children("r1"), ["r2", "r3"].map(NodeId::from));

        let r2 = forest.get("r2").unwrap();
        assert_eq!(r2.label, "Password");
        assert_eq!(r2.description, "Password description");
        let requirement = r2.as_requirement().unwrap();
        assert_eq!(requirement.priority, Priority::Low);
        assert_eq!(requirement.status, Status::Draft);
        assert_eq!(forest.level("r3"), Some("1.2"));
    }

    #[test]
    fn rejects_mismatched_header() {
        let text = "Id,Name,Description,Priority,Type,ParentID\nr1,a,b,High,requirement,\n";
        let err = import_from_csv(text).unwrap_err();
        assert!(matches!(err, CsvError::HeaderMismatch(found) if found.starts_with("Id,")));
    }

    #[test]
    fn keeps_surrounding_whitespace_in_names_and_descriptions() {
        let mut forest = Forest::default();
        forest
            .push_root(
                requirement("r1", " Padded label ", Priority::High)
                    .with_description("  leading and trailing  "),
            )
            .unwrap();

        let imported = import_from_csv(&export_to_csv(&forest).unwrap()).unwrap();

        let node = imported.get("r1").unwrap();
        assert_eq!(node.label, " Padded label ");
        assert_eq!(node.description, "  leading and trailing  ");
    }

    #[test]
    fn trims_keys_and_enumerations() {
        let text = table(&[
            " p , P ,, High , Requirement ,",
            "c,C,,Low,requirement, p ",
        ]);
        let forest = import_from_csv(&text).unwrap();

        let parent = forest.get("p").unwrap();
        assert_eq!(parent.label, " P ");
        assert_eq!(parent.as_requirement().unwrap().priority, Priority::High);
        assert_eq!(forest.parent("c").map(NodeId::as_str), Some("p"));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(import_from_csv(""), Err(CsvError::HeaderMismatch(_))));
    }

    #[test]
    fn resolves_forward_references() {
        let text = table(&[
            "child,C,,Low,requirement,parent",
            "parent,P,,High,requirement,",
        ]);
        let forest = import_from_csv(&text).unwrap();
        assert_eq!(forest.parent("child").unwrap().as_str(), "parent");
    }

    #[test]
    fn drops_rows_with_missing_parents() {
        let text = table(&[
            "a,A,,High,requirement,",
            "orphan,O,,High,requirement,ghost",
            "leaf,L,,Low,requirement,orphan",
        ]);
        let forest = import_from_csv(&text).unwrap();
        assert_eq!(forest.len(), 1);
        assert!(forest.contains("a"));
    }

    #[test]
    fn skips_other_types_blank_ids_and_repeats() {
        let text = table(&[
            "t,T,,High,test,",
            ",N,,High,requirement,",
            "a,First,,High,Requirement,",
            "a,Second,,High,requirement,",
        ]);
        let forest = import_from_csv(&text).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.get("a").unwrap().label, "First");
    }

    #[test]
    fn tolerates_short_rows_and_unknown_priorities() {
        let text = format!("{HEADER}\na,A,desc,Urgent,requirement\n");
        let forest = import_from_csv(&text).unwrap();
        let node = forest.get("a").unwrap();
        assert_eq!(node.as_requirement().unwrap().priority, Priority::Medium);
        assert!(forest.roots().contains(&NodeId::from("a")));
    }
}
