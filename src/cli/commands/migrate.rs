use anyhow::Context;
use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::config::{config, RecordBackend};
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    if config.database.backend != RecordBackend::Postgres {
        anyhow::bail!("RECORD_STORE is not 'postgres'; nothing to migrate");
    }

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to the record store")?;
    db.migrate().await.context("creating tables")?;
    db.close().await;

    let tables = db.tables();
    utils::output_success(
        &output_format,
        "Schema is up to date",
        Some(json!({
            "tables": [tables.projects, tables.teams, tables.users]
        })),
    )
}
