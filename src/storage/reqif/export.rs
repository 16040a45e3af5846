use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use tracing::{instrument, warn};

use super::{
    AttributeDefinition, ReqIfError, SPECIFICATION_TYPE, STRING_DATATYPE, SpecObjectType,
    XHTML_DATATYPE,
};
use crate::domain::{
    Forest, Node, NodeId, NodeKind, Requirement, TestCase, parameter::parameters_to_json,
};

const REQIF_NAMESPACE: &str = "http://www.omg.org/spec/ReqIF/20110401/reqif.xsd";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Serializes a forest to a ReqIF document.
///
/// An empty `project_id` is replaced by a freshly generated one.
///
/// # Errors
///
/// Returns an error if the document cannot be written.
pub fn export_to_reqif(forest: &Forest, project_id: &str) -> Result<String, ReqIfError> {
    ReqIfExporter::new().project_id(project_id).export(forest)
}

/// Writes forests as ReqIF documents.
///
/// The output holds, in order: a header, a fixed datatype and spec-type
/// schema, one spec-object per node in pre-order, one specification whose
/// hierarchy mirrors the forest, and a static tool-extension trailer.
#[derive(Debug, Clone)]
pub struct ReqIfExporter {
    project_id: Option<String>,
    tool_id: String,
    title: String,
    created: DateTime<Utc>,
}

impl Default for ReqIfExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqIfExporter {
    /// An exporter stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project_id: None,
            tool_id: String::from("reqtree"),
            title: String::from("Requirements"),
            created: Utc::now(),
        }
    }

    /// Sets the project id written to the header.
    ///
    /// An empty id means "generate one".
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        self.project_id = (!project_id.is_empty()).then_some(project_id);
        self
    }

    /// Sets the tool identifier written to the header.
    #[must_use]
    pub fn tool_id(mut self, tool_id: impl Into<String>) -> Self {
        self.tool_id = tool_id.into();
        self
    }

    /// Sets the document and specification title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the creation time written to the header.
    #[must_use]
    pub const fn created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Serializes the forest.
    ///
    /// Nodes of unknown type have no spec-object type, so they are left out
    /// together with their subtrees.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    #[instrument(level = "debug", skip_all, fields(nodes = forest.len()))]
    pub fn export(&self, forest: &Forest) -> Result<String, ReqIfError> {
        let project_id = self
            .project_id
            .clone()
            .unwrap_or_else(|| NodeId::generate().to_string());
        let timestamp = self.created.to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut out = XmlOut::new(&timestamp);
        out.declaration()?;
        out.open(
            "REQ-IF",
            &[("xmlns", REQIF_NAMESPACE), ("xmlns:xhtml", XHTML_NAMESPACE)],
        )?;

        self.write_header(&mut out, &project_id)?;

        out.open("CORE-CONTENT", &[])?;
        out.open("REQ-IF-CONTENT", &[])?;
        write_datatypes(&mut out)?;
        write_spec_types(&mut out)?;
        write_spec_objects(&mut out, forest)?;
        self.write_specification(&mut out, forest)?;
        out.close("REQ-IF-CONTENT")?;
        out.close("CORE-CONTENT")?;

        write_tool_extensions(&mut out)?;
        out.close("REQ-IF")?;

        Ok(out.finish())
    }

    fn write_header(&self, out: &mut XmlOut, project_id: &str) -> Result<(), ReqIfError> {
        out.open("THE-HEADER", &[])?;
        out.open("REQ-IF-HEADER", &[("IDENTIFIER", "_Header")])?;
        out.text_element("COMMENT", &format!("Exported by {}", self.tool_id))?;
        let timestamp = out.timestamp;
        out.text_element("CREATION-TIME", timestamp)?;
        out.text_element("PROJECT-ID", project_id)?;
        out.text_element("REPOSITORY-ID", project_id)?;
        out.text_element("REQ-IF-TOOL-ID", &self.tool_id)?;
        out.text_element("REQ-IF-VERSION", "1.0")?;
        out.text_element("SOURCE-TOOL-ID", &self.tool_id)?;
        out.text_element("TITLE", &self.title)?;
        out.close("REQ-IF-HEADER")?;
        out.close("THE-HEADER")
    }

    fn write_specification(&self, out: &mut XmlOut, forest: &Forest) -> Result<(), ReqIfError> {
        let timestamp = out.timestamp;
        out.open("SPECIFICATIONS", &[])?;
        out.open(
            "SPECIFICATION",
            &[
                ("IDENTIFIER", "_Specification"),
                ("LONG-NAME", self.title.as_str()),
                ("LAST-CHANGE", timestamp),
            ],
        )?;
        out.reference("TYPE", "SPECIFICATION-TYPE-REF", SPECIFICATION_TYPE)?;
        write_hierarchy(out, forest, forest.roots())?;
        out.close("SPECIFICATION")?;
        out.close("SPECIFICATIONS")
    }
}

fn write_datatypes(out: &mut XmlOut) -> Result<(), ReqIfError> {
    let timestamp = out.timestamp;
    out.open("DATATYPES", &[])?;
    out.empty(
        "DATATYPE-DEFINITION-STRING",
        &[
            ("IDENTIFIER", STRING_DATATYPE),
            ("LONG-NAME", "String"),
            ("MAX-LENGTH", "32000"),
            ("LAST-CHANGE", timestamp),
        ],
    )?;
    out.empty(
        "DATATYPE-DEFINITION-XHTML",
        &[
            ("IDENTIFIER", XHTML_DATATYPE),
            ("LONG-NAME", "XHTML"),
            ("LAST-CHANGE", timestamp),
        ],
    )?;
    out.close("DATATYPES")
}

fn write_spec_types(out: &mut XmlOut) -> Result<(), ReqIfError> {
    let timestamp = out.timestamp;
    out.open("SPEC-TYPES", &[])?;
    for kind in SpecObjectType::ALL {
        out.open(
            "SPEC-OBJECT-TYPE",
            &[
                ("IDENTIFIER", kind.identifier()),
                ("LONG-NAME", kind.long_name()),
                ("LAST-CHANGE", timestamp),
            ],
        )?;
        out.open("SPEC-ATTRIBUTES", &[])?;
        for definition in kind.attributes() {
            out.open(
                "ATTRIBUTE-DEFINITION-STRING",
                &[
                    ("IDENTIFIER", definition.identifier()),
                    ("LONG-NAME", definition.long_name()),
                    ("LAST-CHANGE", timestamp),
                ],
            )?;
            out.reference("TYPE", "DATATYPE-DEFINITION-STRING-REF", STRING_DATATYPE)?;
            out.close("ATTRIBUTE-DEFINITION-STRING")?;
        }
        out.close("SPEC-ATTRIBUTES")?;
        out.close("SPEC-OBJECT-TYPE")?;
    }
    out.empty(
        "SPECIFICATION-TYPE",
        &[
            ("IDENTIFIER", SPECIFICATION_TYPE),
            ("LONG-NAME", "Specification"),
            ("LAST-CHANGE", timestamp),
        ],
    )?;
    out.close("SPEC-TYPES")
}

fn write_spec_objects(out: &mut XmlOut, forest: &Forest) -> Result<(), ReqIfError> {
    let timestamp = out.timestamp;
    out.open("SPEC-OBJECTS", &[])?;
    for node in exportable(forest) {
        let Some((kind, values)) = attribute_values(node) else {
            continue;
        };

        out.open(
            "SPEC-OBJECT",
            &[
                ("IDENTIFIER", node.id().as_str()),
                ("LAST-CHANGE", timestamp),
            ],
        )?;
        out.open("VALUES", &[])?;
        for (definition, value) in values {
            out.open(
                "ATTRIBUTE-VALUE-STRING",
                &[("THE-VALUE", value.as_ref())],
            )?;
            out.reference(
                "DEFINITION",
                "ATTRIBUTE-DEFINITION-STRING-REF",
                definition.identifier(),
            )?;
            out.close("ATTRIBUTE-VALUE-STRING")?;
        }
        out.close("VALUES")?;
        out.reference("TYPE", "SPEC-OBJECT-TYPE-REF", kind.identifier())?;
        out.close("SPEC-OBJECT")?;
    }
    out.close("SPEC-OBJECTS")
}

fn write_hierarchy(out: &mut XmlOut, forest: &Forest, ids: &[NodeId]) -> Result<(), ReqIfError> {
    let nodes: Vec<&Node> = ids
        .iter()
        .filter_map(|id| forest.get(id))
        .filter(|node| is_exportable(node))
        .collect();
    if nodes.is_empty() {
        return Ok(());
    }

    let timestamp = out.timestamp;
    out.open("CHILDREN", &[])?;
    for node in nodes {
        let identifier = format!("_Hierarchy_{}", node.id());
        out.open(
            "SPEC-HIERARCHY",
            &[("IDENTIFIER", identifier.as_str()), ("LAST-CHANGE", timestamp)],
        )?;
        out.reference("OBJECT", "SPEC-OBJECT-REF", node.id().as_str())?;
        write_hierarchy(out, forest, forest.children(node.id().as_str()))?;
        out.close("SPEC-HIERARCHY")?;
    }
    out.close("CHILDREN")
}

fn write_tool_extensions(out: &mut XmlOut) -> Result<(), ReqIfError> {
    out.open("TOOL-EXTENSIONS", &[])?;
    out.empty("REQ-IF-TOOL-EXTENSION", &[])?;
    out.close("TOOL-EXTENSIONS")
}

fn is_exportable(node: &Node) -> bool {
    if SpecObjectType::for_tag(node.type_tag()).is_some() {
        return true;
    }
    warn!(id = %node.id(), "skipping node of unknown type and its subtree");
    false
}

/// The nodes to export, in pre-order, minus unknown-type subtrees.
fn exportable(forest: &Forest) -> Vec<&Node> {
    let mut nodes = Vec::with_capacity(forest.len());
    let mut stack: Vec<&NodeId> = forest.roots().iter().rev().collect();
    while let Some(id) = stack.pop() {
        let Some(node) = forest.get(id) else {
            continue;
        };
        if SpecObjectType::for_tag(node.type_tag()).is_none() {
            continue;
        }
        nodes.push(node);
        stack.extend(forest.children(id).iter().rev());
    }
    nodes
}

type Values<'a> = Vec<(AttributeDefinition, Cow<'a, str>)>;

/// The spec-object type and attribute values for a node.
fn attribute_values(node: &Node) -> Option<(SpecObjectType, Values<'_>)> {
    use AttributeDefinition as A;

    let label = Cow::Borrowed(node.label.as_str());
    let description = Cow::Borrowed(node.description.as_str());
    let tag = Cow::Borrowed(node.type_tag().as_str());

    match &node.kind {
        NodeKind::Requirement(Requirement {
            priority,
            status,
            other_data,
        }) => {
            let other_data = if other_data.is_empty() {
                String::new()
            } else {
                serde_json::to_string(other_data).unwrap_or_default()
            };
            Some((
                SpecObjectType::Requirement,
                vec![
                    (A::RequirementTitle, label),
                    (A::RequirementDescription, description),
                    (A::RequirementType, tag),
                    (A::Priority, Cow::Borrowed(priority.as_str())),
                    (A::Status, Cow::Borrowed(status.as_str())),
                    (A::RequirementOtherData, Cow::Owned(other_data)),
                ],
            ))
        }
        NodeKind::Test => Some((
            SpecObjectType::Test,
            vec![
                (A::TestTitle, label),
                (A::TestDescription, description),
                (A::TestType, tag),
            ],
        )),
        NodeKind::TestCase(TestCase {
            scenario,
            steps,
            prerequisites,
            test_data,
            expected_results,
            parameters,
        }) => Some((
            SpecObjectType::TestCase,
            vec![
                (A::TestCaseTitle, label),
                (A::TestCaseDescription, description),
                (A::TestCaseType, tag),
                (A::Steps, Cow::Owned(steps.join(","))),
                (A::Prerequisites, Cow::Owned(prerequisites.join(","))),
                (A::Parameters, Cow::Owned(parameters_to_json(parameters))),
                (A::Scenario, Cow::Borrowed(scenario.as_str())),
                (A::TestData, Cow::Owned(test_data.join(","))),
                (A::ExpectedResults, Cow::Owned(expected_results.join(","))),
            ],
        )),
        NodeKind::Unknown(_) => None,
    }
}

/// An indenting XML writer that stamps every `LAST-CHANGE` with one
/// timestamp.
struct XmlOut<'a> {
    writer: Writer<Vec<u8>>,
    timestamp: &'a str,
}

impl<'a> XmlOut<'a> {
    fn new(timestamp: &'a str) -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
            timestamp,
        }
    }

    fn declaration(&mut self) -> Result<(), ReqIfError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ReqIfError> {
        self.writer
            .write_event(Event::Start(start(name, attributes)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ReqIfError> {
        self.writer
            .write_event(Event::Empty(start(name, attributes)))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), ReqIfError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), ReqIfError> {
        self.open(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Writes `<wrapper><kind>target</kind></wrapper>`.
    fn reference(&mut self, wrapper: &str, kind: &str, target: &str) -> Result<(), ReqIfError> {
        self.open(wrapper, &[])?;
        self.text_element(kind, target)?;
        self.close(wrapper)
    }

    fn finish(self) -> String {
        String::from_utf8_lossy(&self.writer.into_inner()).into_owned()
    }
}

/// Builds a start tag. Attribute values are escaped here, including line
/// breaks and tabs, which XML parsers would otherwise normalize to spaces.
fn start<'n>(name: &'n str, attributes: &[(&str, &str)]) -> BytesStart<'n> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        let escaped = quick_xml::escape::escape(*value)
            .replace('\n', "&#10;")
            .replace('\r', "&#13;")
            .replace('\t', "&#9;");
        start.push_attribute((key.as_bytes(), escaped.as_bytes()));
    }
    start
}
