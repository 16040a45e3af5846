use std::path::PathBuf;

use clap::Parser;
use reqtree::{Node, NodeKind, Session};
use tracing::instrument;

use super::terminal::{Colorize, badge};

#[derive(Debug, Parser)]
#[command(about = "Display every attribute of a node")]
pub struct Show {
    /// The id of the node to display
    id: String,
}

impl Show {
    #[instrument(level = "debug")]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let session = Session::open(root)?;
        let forest = session.forest();

        let Some(node) = forest.get(&self.id) else {
            anyhow::bail!("no node with id '{}'", self.id);
        };

        println!("{} {}", badge(node.type_tag()), node.label);
        println!("{}\n", node.description);

        println!("{}", "Metadata".dim());
        println!("  Id:     {}", node.id());
        println!("  Level:  {}", forest.level(&self.id).unwrap_or("?"));
        if let Some(parent) = forest.parent(&self.id) {
            println!("  Parent: {parent}");
        }

        print_variant(node);

        let children = forest.children(&self.id);
        if !children.is_empty() {
            println!("\n{}", "Children".dim());
            for child in children {
                let label = forest.get(child.as_str()).map_or("", |c| c.label.as_str());
                println!("  • {} {}", child.to_string().dim(), label);
            }
        }
        Ok(())
    }
}

fn print_variant(node: &Node) {
    match &node.kind {
        NodeKind::Requirement(requirement) => {
            println!("  Priority: {}", requirement.priority);
            println!("  Status:   {}", requirement.status);
            if !requirement.other_data.is_empty() {
                println!("\n{}", "Other data".dim());
                for (key, value) in &requirement.other_data {
                    println!("  {key}: {value:?}");
                }
            }
        }
        NodeKind::Test => {}
        NodeKind::TestCase(test_case) => {
            if !test_case.scenario.is_empty() {
                println!("  Scenario: {}", test_case.scenario);
            }
            print_list("Prerequisites", &test_case.prerequisites);
            print_list("Steps", &test_case.steps);
            print_list("Test data", &test_case.test_data);
            print_list("Expected results", &test_case.expected_results);
            if !test_case.parameters.is_empty() {
                println!("\n{}", "Parameters".dim());
                for parameter in &test_case.parameters {
                    println!(
                        "  {} ({}) = {}",
                        parameter.name(),
                        parameter.kind(),
                        parameter.value()
                    );
                }
            }
        }
        NodeKind::Unknown(fields) => {
            println!("\n{}", "Unrecognised fields".warning());
            for (key, value) in fields {
                println!("  {key}: {value}");
            }
        }
    }
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}", heading.dim());
    for (i, item) in items.iter().enumerate() {
        println!("  {}. {item}", i + 1);
    }
}
