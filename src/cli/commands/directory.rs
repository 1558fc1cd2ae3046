use anyhow::Context;
use clap::Subcommand;

use crate::cli::{utils, OutputFormat};
use crate::config::{config, RecordBackend};
use crate::database::models::ProjectKey;
use crate::database::{DatabaseManager, PgRecordStore, RecordStore};

#[derive(Subcommand)]
pub enum DirectoryCommands {
    #[command(about = "Print a project's folder tree")]
    Show {
        #[arg(help = "Owner user id")]
        owner: String,
        #[arg(help = "Project id")]
        project: String,
    },
}

pub async fn handle(cmd: DirectoryCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DirectoryCommands::Show { owner, project } => {
            let config = config();
            if config.database.backend != RecordBackend::Postgres {
                anyhow::bail!("directory show needs RECORD_STORE=postgres");
            }
            let db = DatabaseManager::connect(&config.database)
                .await
                .context("connecting to the record store")?;
            let store = PgRecordStore::new(db);

            let key = ProjectKey::new(&owner, &project);
            let record = store
                .get_project(&key)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Project '{}' not found for owner '{}'", project, owner))?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record.directory)?),
                OutputFormat::Text => {
                    println!("{} ({})", record.name, record.project_id);
                    for line in utils::tree_lines(&record.directory) {
                        println!("{}", line);
                    }
                }
            }
            Ok(())
        }
    }
}
