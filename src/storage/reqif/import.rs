use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument, trace, warn};

use super::{
    AttributeDefinition, ReqIfError, SpecObjectType,
    xml::{self, Element},
};
use crate::domain::{
    DEFAULT_DESCRIPTION, ExtraValue, Forest, Node, NodeId, NodeKind, Requirement, TestCase,
    parameter::parameters_from_json,
};

/// Reconstructs a forest from a ReqIF document.
///
/// Spec-objects of an unknown type are dropped, and hierarchy entries that
/// reference a missing or dropped spec-object are skipped together with
/// their subtrees. Neither is an error.
///
/// # Errors
///
/// Returns a parse error if the document is not well-formed XML, or
/// [`ReqIfError::MissingSection`] if it lacks the spec-object or
/// specification sections (see [`ReqIfError::is_schema_gap`]).
#[instrument(level = "debug", skip_all, fields(bytes = xml.len()))]
pub fn import_from_reqif(xml: &str) -> Result<Forest, ReqIfError> {
    let root = xml::parse(xml)?;
    if root.name != "REQ-IF" {
        return Err(ReqIfError::MissingSection("REQ-IF"));
    }

    let content = root
        .path(&["CORE-CONTENT", "REQ-IF-CONTENT"])
        .ok_or(ReqIfError::MissingSection("REQ-IF-CONTENT"))?;
    let objects = content
        .child("SPEC-OBJECTS")
        .ok_or(ReqIfError::MissingSection("SPEC-OBJECTS"))?;
    let specifications = content
        .child("SPECIFICATIONS")
        .ok_or(ReqIfError::MissingSection("SPECIFICATIONS"))?;

    let mut lookup = read_spec_objects(objects);
    let mut forest = Forest::with_capacity(lookup.len());

    for specification in specifications.children_named("SPECIFICATION") {
        if let Some(children) = specification.child("CHILDREN") {
            attach(&mut forest, None, children, &mut lookup);
        }
    }

    if !lookup.is_empty() {
        debug!(
            count = lookup.len(),
            "spec-objects not referenced by any hierarchy were ignored"
        );
    }

    forest.assign_levels();
    Ok(forest)
}

/// Builds a node from every spec-object of a known type, keyed by id.
fn read_spec_objects(objects: &Element) -> HashMap<String, Node> {
    let mut lookup = HashMap::new();
    for element in objects.children_named("SPEC-OBJECT") {
        let Some(node) = read_spec_object(element) else {
            continue;
        };
        if lookup.contains_key(node.id().as_str()) {
            warn!(id = %node.id(), "duplicate spec-object identifier, keeping the first");
            continue;
        }
        lookup.insert(node.id().to_string(), node);
    }
    lookup
}

fn read_spec_object(element: &Element) -> Option<Node> {
    let Some(id) = element.attribute("IDENTIFIER") else {
        warn!("skipping spec-object without an identifier");
        return None;
    };

    let type_ref = element
        .path(&["TYPE", "SPEC-OBJECT-TYPE-REF"])
        .map_or("", |type_ref| type_ref.text().trim());
    let Some(kind) = SpecObjectType::from_identifier(type_ref) else {
        warn!(id, type_ref, "dropping spec-object of unknown type");
        return None;
    };

    let mut fields = Fields::default();
    for value in element
        .child("VALUES")
        .into_iter()
        .flat_map(|values| values.children_named("ATTRIBUTE-VALUE-STRING"))
    {
        let definition_ref = value
            .path(&["DEFINITION", "ATTRIBUTE-DEFINITION-STRING-REF"])
            .map_or("", |definition| definition.text().trim());
        let Some(definition) = AttributeDefinition::from_identifier(definition_ref) else {
            trace!(id, definition_ref, "ignoring value of unknown attribute");
            continue;
        };
        fields.set(definition, value.attribute("THE-VALUE").unwrap_or_default());
    }

    Some(fields.into_node(NodeId::new(id), kind))
}

/// Attaches the nodes referenced by `children`'s hierarchy entries under
/// `parent`, recursing into each entry's own children.
///
/// Nodes are taken out of `lookup` as they are placed, so a spec-object
/// referenced twice is only placed once. A reference matches an identifier
/// exactly, or failing that once surrounding whitespace is removed.
fn attach(
    forest: &mut Forest,
    parent: Option<&NodeId>,
    children: &Element,
    lookup: &mut HashMap<String, Node>,
) {
    for hierarchy in children.children_named("SPEC-HIERARCHY") {
        let reference = hierarchy
            .path(&["OBJECT", "SPEC-OBJECT-REF"])
            .map(Element::text)
            .unwrap_or_default();

        let Some(node) = lookup
            .remove(reference)
            .or_else(|| lookup.remove(reference.trim()))
        else {
            warn!(reference, "unresolvable hierarchy reference, skipping subtree");
            continue;
        };

        let id = match forest.push(parent.map(NodeId::as_str), node) {
            Ok(id) => id,
            Err(e) => {
                warn!(reference, "skipping hierarchy entry: {e}");
                continue;
            }
        };

        if let Some(grandchildren) = hierarchy.child("CHILDREN") {
            attach(forest, Some(&id), grandchildren, lookup);
        }
    }
}

/// The attribute values of one spec-object, by field.
#[derive(Debug, Default)]
struct Fields {
    label: Option<String>,
    description: Option<String>,
    type_tag: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    other_data: Option<String>,
    steps: Option<String>,
    prerequisites: Option<String>,
    parameters: Option<String>,
    scenario: Option<String>,
    test_data: Option<String>,
    expected_results: Option<String>,
}

impl Fields {
    fn set(&mut self, definition: AttributeDefinition, value: &str) {
        use AttributeDefinition as A;

        let slot = match definition {
            A::RequirementTitle | A::TestTitle | A::TestCaseTitle => &mut self.label,
            A::RequirementDescription | A::TestDescription | A::TestCaseDescription => {
                &mut self.description
            }
            A::RequirementType | A::TestType | A::TestCaseType => &mut self.type_tag,
            A::Priority => &mut self.priority,
            A::Status => &mut self.status,
            A::RequirementOtherData => &mut self.other_data,
            A::Steps => &mut self.steps,
            A::Prerequisites => &mut self.prerequisites,
            A::Parameters => &mut self.parameters,
            A::Scenario => &mut self.scenario,
            A::TestData => &mut self.test_data,
            A::ExpectedResults => &mut self.expected_results,
        };
        *slot = Some(value.to_string());
    }

    fn into_node(self, id: NodeId, kind: SpecObjectType) -> Node {
        match self.type_tag.as_deref() {
            Some(tag) if !tag.is_empty() && tag != kind.type_tag().as_str() => {
                debug!(%id, tag, "type attribute disagrees with spec-object type");
            }
            _ => {}
        }

        let node_kind = match kind {
            SpecObjectType::Requirement => NodeKind::Requirement(Requirement {
                priority: parse_or_default(&id, self.priority.as_deref()),
                status: parse_or_default(&id, self.status.as_deref()),
                other_data: other_data_from_json(&id, self.other_data.as_deref()),
            }),
            SpecObjectType::Test => NodeKind::Test,
            SpecObjectType::TestCase => NodeKind::TestCase(TestCase {
                scenario: self.scenario.unwrap_or_default(),
                steps: split_list(self.steps.as_deref()),
                prerequisites: split_list(self.prerequisites.as_deref()),
                test_data: split_list(self.test_data.as_deref()),
                expected_results: split_list(self.expected_results.as_deref()),
                parameters: parameters_from_json(self.parameters.as_deref().unwrap_or_default()),
            }),
        };

        Node::with_id(id, self.label.unwrap_or_default(), node_kind).with_description(
            self.description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        )
    }
}

/// Splits a comma-joined list. An empty value is an empty list.
fn split_list(value: Option<&str>) -> Vec<String> {
    match value {
        None | Some("") => Vec::new(),
        Some(value) => value.split(',').map(str::to_string).collect(),
    }
}

fn parse_or_default<T>(id: &NodeId, value: Option<&str>) -> T
where
    T: std::str::FromStr + Default,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim) {
        None | Some("") => T::default(),
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!(%id, "{e}, using the default");
            T::default()
        }),
    }
}

/// Decodes the extension map entry by entry. An entry that is not a string,
/// a number or a boolean is dropped on its own.
fn other_data_from_json(id: &NodeId, value: Option<&str>) -> BTreeMap<String, ExtraValue> {
    let json = match value.map(str::trim) {
        None | Some("") => return BTreeMap::new(),
        Some(json) => json,
    };

    let entries: BTreeMap<String, serde_json::Value> = match serde_json::from_str(json) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(%id, "ignoring malformed extension data: {e}");
            return BTreeMap::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<ExtraValue>(value) {
            Ok(value) => Some((key, value)),
            Err(e) => {
                warn!(%id, %key, "dropping extension value: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Status};
    use crate::storage::reqif::export_to_reqif;

    /// Wraps spec-objects and a hierarchy into a minimal document.
    fn document(objects: &str, hierarchy: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <REQ-IF xmlns="http://www.omg.org/spec/ReqIF/20110401/reqif.xsd">
              <CORE-CONTENT><REQ-IF-CONTENT>
                <SPEC-OBJECTS>{objects}</SPEC-OBJECTS>
                <SPECIFICATIONS><SPECIFICATION IDENTIFIER="s">
                  <CHILDREN>{hierarchy}</CHILDREN>
                </SPECIFICATION></SPECIFICATIONS>
              </REQ-IF-CONTENT></CORE-CONTENT>
            </REQ-IF>"#
        )
    }

    fn object(id: &str, kind: &str, values: &[(&str, &str)]) -> String {
        let values: String = values
            .iter()
            .map(|(definition, value)| {
                format!(
                    r#"<ATTRIBUTE-VALUE-STRING THE-VALUE="{value}"><DEFINITION><ATTRIBUTE-DEFINITION-STRING-REF>{definition}</ATTRIBUTE-DEFINITION-STRING-REF></DEFINITION></ATTRIBUTE-VALUE-STRING>"#
                )
            })
            .collect();
        format!(
            r#"<SPEC-OBJECT IDENTIFIER="{id}"><TYPE><SPEC-OBJECT-TYPE-REF>{kind}</SPEC-OBJECT-TYPE-REF></TYPE><VALUES>{values}</VALUES></SPEC-OBJECT>"#
        )
    }

    fn hierarchy(id: &str, children: &str) -> String {
        format!(
            r#"<SPEC-HIERARCHY IDENTIFIER="h-{id}"><OBJECT><SPEC-OBJECT-REF>{id}</SPEC-OBJECT-REF></OBJECT><CHILDREN>{children}</CHILDREN></SPEC-HIERARCHY>"#
        )
    }

    #[test]
    fn reads_typed_fields() {
        let objects = [
            object(
                "r1",
                "_RequirementType",
                &[
                    ("_Requirement_Title", "Login"),
                    ("_Requirement_Description", "Users can log in"),
                    ("_Priority", "High"),
                    ("_Status", "Approved"),
                ],
            ),
            object(
                "tc1",
                "_TestCaseType",
                &[
                    ("_TestCase_Title", "Login success"),
                    ("_Steps", "open app,enter credentials"),
                    ("_Prerequisites", ""),
                    (
                        "_Parameters",
                        "[{&quot;name&quot;:&quot;user&quot;,&quot;type&quot;:&quot;string&quot;,&quot;value&quot;:&quot;alice&quot;}]",
                    ),
                ],
            ),
        ]
        .concat();
        let xml = document(&objects, &hierarchy("r1", &hierarchy("tc1", "")));

        let forest = import_from_reqif(&xml).unwrap();

        let r1 = forest.get("r1").unwrap();
        assert_eq!(r1.label, "Login");
        assert_eq!(r1.description, "Users can log in");
        let requirement = r1.as_requirement().unwrap();
        assert_eq!(requirement.priority, Priority::High);
        assert_eq!(requirement.status, Status::Approved);

        let tc1 = forest.get("tc1").unwrap();
        assert_eq!(forest.parent("tc1").unwrap().as_str(), "r1");
        assert_eq!(tc1.description, DEFAULT_DESCRIPTION);
        let test_case = tc1.as_test_case().unwrap();
        assert_eq!(test_case.steps, ["open app", "enter credentials"]);
        assert!(test_case.prerequisites.is_empty());
        assert_eq!(test_case.parameters.len(), 1);
        assert_eq!(test_case.parameters[0].value(), "alice");

        assert_eq!(forest.level("tc1"), Some("1.1"));
    }

    #[test]
    fn drops_unknown_types_without_aborting() {
        let objects = [
            object("a", "_TestType", &[("_Test_Title", "A")]),
            object("x", "_RiskType", &[("_Test_Title", "X")]),
            object("b", "_TestType", &[("_Test_Title", "B")]),
        ]
        .concat();
        let roots = [
            hierarchy("a", ""),
            hierarchy("x", &hierarchy("b", "")),
            hierarchy("b", ""),
        ];
        let xml = document(&objects, &roots.concat());

        let forest = import_from_reqif(&xml).unwrap();

        assert!(!forest.contains("x"));
        assert_eq!(forest.roots(), ["a", "b"].map(NodeId::from));
    }

    #[test]
    fn skips_subtrees_of_unresolvable_references() {
        let objects = [
            object("a", "_TestType", &[]),
            object("c", "_TestType", &[]),
        ]
        .concat();
        let roots = [
            hierarchy("missing", &hierarchy("c", "")),
            hierarchy("a", ""),
        ];
        let xml = document(&objects, &roots.concat());

        let forest = import_from_reqif(&xml).unwrap();

        assert_eq!(forest.len(), 1);
        assert!(forest.contains("a"));
    }

    #[test]
    fn keeps_identifiers_with_surrounding_whitespace() {
        let mut forest = Forest::default();
        forest
            .push_root(Node::with_id(NodeId::from(" r1"), "Padded", NodeKind::Test))
            .unwrap();
        forest
            .push_child(" r1", Node::with_id(NodeId::from("c1 "), "Child", NodeKind::Test))
            .unwrap();

        let imported = import_from_reqif(&export_to_reqif(&forest, "p").unwrap()).unwrap();

        assert_eq!(imported, forest);
        assert_eq!(imported.parent("c1 ").map(NodeId::as_str), Some(" r1"));
    }

    #[test]
    fn resolves_references_laid_out_over_several_lines() {
        let objects = object("a", "_TestType", &[]);
        let xml = document(
            &objects,
            r#"<SPEC-HIERARCHY IDENTIFIER="h">
                 <OBJECT>
                   <SPEC-OBJECT-REF>
                     a
                   </SPEC-OBJECT-REF>
                 </OBJECT>
               </SPEC-HIERARCHY>"#,
        );

        let forest = import_from_reqif(&xml).unwrap();
        assert_eq!(forest.roots(), [NodeId::from("a")]);
    }

    #[test]
    fn drops_only_the_unreadable_extension_values() {
        let mut other_data = BTreeMap::new();
        other_data.insert("owner".to_string(), ExtraValue::String("qa".into()));
        other_data.insert("ratio".to_string(), ExtraValue::Number(f64::INFINITY));
        let mut forest = Forest::default();
        forest
            .push_root(Node::with_id(
                NodeId::from("r1"),
                "Ratio",
                NodeKind::Requirement(Requirement {
                    other_data,
                    ..Requirement::default()
                }),
            ))
            .unwrap();

        let imported = import_from_reqif(&export_to_reqif(&forest, "p").unwrap()).unwrap();

        let other_data = &imported.get("r1").unwrap().as_requirement().unwrap().other_data;
        assert_eq!(other_data.len(), 1);
        assert_eq!(other_data["owner"], ExtraValue::String("qa".into()));
    }

    #[test]
    fn reads_extension_values_of_each_type() {
        let json = r#"{"owner":"qa","estimate":2,"blocking":false,"tags":["a"],"none":null}"#;
        let data = other_data_from_json(&NodeId::from("r"), Some(json));

        assert_eq!(data.len(), 3);
        assert_eq!(data["estimate"], ExtraValue::Number(2.0));
        assert_eq!(data["blocking"], ExtraValue::Boolean(false));
        assert!(other_data_from_json(&NodeId::from("r"), Some("[1]")).is_empty());
    }

    #[test]
    fn places_a_twice_referenced_object_once() {
        let objects = object("a", "_TestType", &[]);
        let xml = document(&objects, &[hierarchy("a", ""), hierarchy("a", "")].concat());

        let forest = import_from_reqif(&xml).unwrap();
        assert_eq!(forest.roots().len(), 1);
    }

    #[test]
    fn falls_back_on_bad_enum_values_and_parameters() {
        let objects = object(
            "r",
            "_RequirementType",
            &[("_Priority", "Urgent"), ("_Status", ""), ("_Parameters", "oops")],
        );
        let xml = document(&objects, &hierarchy("r", ""));

        let forest = import_from_reqif(&xml).unwrap();
        let requirement = forest.get("r").unwrap().as_requirement().unwrap();
        assert_eq!(requirement.priority, Priority::Medium);
        assert_eq!(requirement.status, Status::Draft);
    }

    #[test]
    fn malformed_xml_is_a_parse_failure() {
        let err = import_from_reqif("<REQ-IF><CORE-CONTENT></REQ-IF>").unwrap_err();
        assert!(!err.is_schema_gap());
    }

    #[test]
    fn missing_spec_objects_is_a_schema_gap() {
        let xml = r"<REQ-IF><CORE-CONTENT><REQ-IF-CONTENT><SPECIFICATIONS/></REQ-IF-CONTENT></CORE-CONTENT></REQ-IF>";
        let err = import_from_reqif(xml).unwrap_err();
        assert!(err.is_schema_gap());
        assert!(matches!(err, ReqIfError::MissingSection("SPEC-OBJECTS")));
    }

    #[test]
    fn foreign_root_is_a_schema_gap() {
        let err = import_from_reqif("<html><body/></html>").unwrap_err();
        assert!(err.is_schema_gap());
    }
}
