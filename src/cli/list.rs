use std::path::PathBuf;

use clap::Parser;
use reqtree::{Session, TypeTag};
use tracing::instrument;

use super::terminal::{Colorize, badge};

#[derive(Debug, Default, Parser)]
#[command(about = "List the forest as an indented tree")]
pub struct List {
    /// Only show nodes of this kind
    #[arg(long, value_enum)]
    kind: Option<Kind>,

    /// Show node ids
    #[arg(long)]
    ids: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Kind {
    Requirement,
    Test,
    TestCase,
}

impl Kind {
    const fn tag(self) -> TypeTag {
        match self {
            Self::Requirement => TypeTag::Requirement,
            Self::Test => TypeTag::Test,
            Self::TestCase => TypeTag::TestCase,
        }
    }
}

impl List {
    #[instrument(level = "debug")]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let session = Session::open(root)?;
        let forest = session.forest();

        if forest.is_empty() {
            println!("{}", "No nodes".dim());
            return Ok(());
        }

        let mut shown = 0_usize;
        for (node, depth) in forest.iter() {
            let tag = node.type_tag();
            if self.kind.is_some_and(|kind| kind.tag() != tag) {
                continue;
            }

            let level = forest.level(node.id().as_str()).unwrap_or("?");
            let indent = "  ".repeat(depth);
            let id = if self.ids {
                format!(" {}", node.id().to_string().dim())
            } else {
                String::new()
            };
            println!("{indent}{} {} {}{id}", level.info(), badge(tag), node.label);
            shown += 1;
        }

        println!();
        println!("{}", format!("{shown} of {} node(s)", forest.len()).dim());
        Ok(())
    }
}
