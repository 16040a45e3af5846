use std::path::PathBuf;

use clap::Parser;
use reqtree::Session;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Export {
    /// The file to write. Its extension selects the format.
    path: PathBuf,
}

impl Export {
    #[instrument(level = "debug")]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let session = Session::open(root)?;
        session.export_to_path(&self.path)?;

        println!(
            "{} {} node(s) to {}",
            "Exported".success(),
            session.forest().len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Import {
    /// The file to read. Its extension selects the format.
    path: PathBuf,
}

impl Import {
    #[instrument(level = "debug")]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut session = Session::open(root)?;
        let count = session.import_from_path(&self.path)?;

        if count == 0 {
            println!("{}", "No requirements found, nothing imported".warning());
            return Ok(());
        }

        session.save()?;
        println!(
            "{} {count} node(s) from {}",
            "Imported".success(),
            self.path.display()
        );
        Ok(())
    }
}
