use std::path::PathBuf;

mod add;
mod list;
mod show;
mod terminal;
mod transfer;

use add::Add;
use clap::ArgAction;
use list::List;
use reqtree::Session;
use show::Show;
use terminal::Colorize;
use tracing::instrument;
use transfer::{Export, Import};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the workspace
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::List(List::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Initialize a new workspace
    Init,

    /// Add a requirement, test or test case
    #[command(subcommand)]
    Add(Add),

    /// Delete a node and everything beneath it
    Delete(Delete),

    /// Move a node (with its subtree) under a new parent
    Move(Move),

    /// List the forest as a tree (default)
    List(List),

    /// Show every attribute of a node
    Show(Show),

    /// Export the forest to a `.reqif` or `.csv` file
    Export(Export),

    /// Replace the forest with the contents of a `.reqif` or `.csv` file
    Import(Import),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Init => Init::run(root)?,
            Self::Add(command) => command.run(root)?,
            Self::Delete(command) => command.run(root)?,
            Self::Move(command) => command.run(root)?,
            Self::List(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Export(command) => command.run(root)?,
            Self::Import(command) => command.run(root)?,
        }
        Ok(())
    }
}

struct Init;

impl Init {
    #[instrument]
    fn run(root: PathBuf) -> anyhow::Result<()> {
        let session = Session::init(root)?;

        println!(
            "{} workspace in {}",
            "Initialized".success(),
            session.root().display()
        );
        println!("  Forest file: {}", session.config().forest_file().display());
        println!();
        println!("Next steps:");
        println!("  reqtree add requirement \"Your first requirement\"");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The id of the node to delete
    id: String,
}

impl Delete {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut session = Session::open(root)?;
        let removed = session.delete(&self.id)?;
        session.save()?;

        println!("{} {} node(s)", "Deleted".warning(), removed.len());
        for node in &removed {
            println!("  {} {}", node.id().to_string().dim(), node.label);
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Move {
    /// The id of the node to move
    id: String,

    /// The id of the new parent. Omit to make the node a root.
    #[arg(short, long)]
    parent: Option<String>,
}

impl Move {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut session = Session::open(root)?;
        session.move_node(&self.id, self.parent.as_deref())?;
        session.save()?;

        let level = session.forest().level(&self.id).unwrap_or("?");
        println!("{} {} to level {level}", "Moved".success(), self.id);
        Ok(())
    }
}
