use std::path::PathBuf;

use clap::{Args, Subcommand};
use reqtree::{
    Node, NodeKind, Parameter, ParameterType, Priority, Requirement, Session, Status, TestCase,
};
use tracing::instrument;

use super::terminal::{Colorize, badge};

#[derive(Debug, Subcommand)]
pub enum Add {
    /// Add a requirement
    Requirement(AddRequirement),

    /// Add a test
    Test(Common),

    /// Add a test case
    TestCase(AddTestCase),
}

/// Arguments shared by every node variant.
#[derive(Debug, Args)]
pub struct Common {
    /// The node's label
    label: String,

    /// A longer description
    #[arg(short, long)]
    description: Option<String>,

    /// The id of the parent node. Omit to add a root.
    #[arg(short, long)]
    parent: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddRequirement {
    #[command(flatten)]
    common: Common,

    /// Priority (High, Medium, Low)
    #[arg(long, default_value_t)]
    priority: Priority,

    /// Status (Draft, Ready, Reviewed, Approved, Released)
    #[arg(long, default_value_t)]
    status: Status,
}

#[derive(Debug, Args)]
pub struct AddTestCase {
    #[command(flatten)]
    common: Common,

    /// The scenario under test
    #[arg(long, default_value = "")]
    scenario: String,

    /// A step to perform (repeatable)
    #[arg(long = "step", value_name = "STEP", value_parser = parse_list_item)]
    steps: Vec<String>,

    /// A prerequisite (repeatable)
    #[arg(long = "prerequisite", value_name = "PREREQUISITE", value_parser = parse_list_item)]
    prerequisites: Vec<String>,

    /// An item of test data (repeatable)
    #[arg(long = "test-data", value_name = "DATA", value_parser = parse_list_item)]
    test_data: Vec<String>,

    /// An expected result (repeatable)
    #[arg(long = "expect", value_name = "RESULT", value_parser = parse_list_item)]
    expected_results: Vec<String>,

    /// A typed parameter, as `name:type=value` (repeatable)
    #[arg(long = "param", value_name = "NAME:TYPE=VALUE", value_parser = parse_parameter)]
    parameters: Vec<Parameter>,
}

impl Add {
    #[instrument(level = "debug")]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let (common, kind) = match self {
            Self::Requirement(args) => (
                args.common,
                NodeKind::Requirement(Requirement {
                    priority: args.priority,
                    status: args.status,
                    ..Requirement::default()
                }),
            ),
            Self::Test(common) => (common, NodeKind::Test),
            Self::TestCase(args) => (
                args.common,
                NodeKind::TestCase(TestCase {
                    scenario: args.scenario,
                    steps: args.steps,
                    prerequisites: args.prerequisites,
                    test_data: args.test_data,
                    expected_results: args.expected_results,
                    parameters: args.parameters,
                }),
            ),
        };

        let mut node = Node::new(common.label, kind);
        if let Some(description) = common.description {
            node = node.with_description(description);
        }
        let tag = node.type_tag();

        let mut session = Session::open(root)?;
        let id = session.add(common.parent.as_deref(), node)?;
        session.save()?;

        let level = session.forest().level(id.as_str()).unwrap_or("?");
        println!("{} {} {level} {}", "Added".success(), badge(tag), id.to_string().dim());
        Ok(())
    }
}

/// Accepts one item of a list field. Lists are stored comma-joined, so an
/// empty item or one containing a comma would not read back as written.
fn parse_list_item(s: &str) -> Result<String, String> {
    if s.is_empty() {
        Err("an item cannot be empty".to_string())
    } else if s.contains(',') {
        Err(format!("'{s}' contains a comma, which separates list items"))
    } else {
        Ok(s.to_string())
    }
}

/// Parses `name:type=value`.
fn parse_parameter(s: &str) -> Result<Parameter, String> {
    let (declaration, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME:TYPE=VALUE, got '{s}'"))?;
    let (name, kind) = declaration
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:TYPE=VALUE, got '{s}'"))?;
    let kind: ParameterType = kind.parse().map_err(|e| format!("{e}"))?;
    Parameter::new(name, kind, value).map_err(|e| format!("{e}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(subcommand)]
        add: Add,
    }

    #[test]
    fn rejects_list_items_that_would_not_read_back() {
        assert_eq!(parse_list_item("open app").unwrap(), "open app");
        assert!(parse_list_item("").is_err());
        assert!(parse_list_item("a,b").is_err());

        let parse = |flag: &str, value: &str| {
            Harness::try_parse_from(["reqtree", "test-case", "Case", flag, value])
        };
        assert!(parse("--step", "").is_err());
        assert!(parse("--prerequisite", "").is_err());
        assert!(parse("--test-data", "1,2").is_err());
        assert!(parse("--expect", "").is_err());
        assert!(parse("--step", "open app").is_ok());
    }

    #[test]
    fn parses_typed_parameters() {
        let parameter = parse_parameter("retries:int=3").unwrap();
        assert_eq!(parameter.name().as_str(), "retries");
        assert_eq!(parameter.kind(), ParameterType::Int);
        assert_eq!(parameter.value(), "3");

        let parameter = parse_parameter("tags:array=[\"a\",\"b\"]").unwrap();
        assert_eq!(parameter.kind(), ParameterType::Array);
    }

    #[test]
    fn rejects_malformed_parameters() {
        assert!(parse_parameter("retries=3").is_err());
        assert!(parse_parameter("retries:int").is_err());
        assert!(parse_parameter("retries:int=three").is_err());
        assert!(parse_parameter("retries:decimal=3").is_err());
        assert!(parse_parameter("two words:string=x").is_err());
    }
}
