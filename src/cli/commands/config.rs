use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the effective configuration with secrets masked")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let shown = config().redacted();
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
                OutputFormat::Text => {
                    println!("Environment: {:?}", shown.environment);
                    println!("Listen:      {}", shown.bind_address());
                    println!("Public URL:  {}", shown.server.public_url);
                    println!("Frontend:    {}", shown.server.frontend_url);
                    println!(
                        "Records:     {:?} ({}, {}, {})",
                        shown.database.backend,
                        shown.database.tables.projects,
                        shown.database.tables.teams,
                        shown.database.tables.users
                    );
                    if let Some(url) = &shown.database.url {
                        println!("Database:    {}", url);
                    }
                    println!(
                        "Blobs:       {:?} (bucket '{}', region {})",
                        shown.storage.backend, shown.storage.bucket, shown.storage.region
                    );
                    println!("Identity:    {:?}", shown.identity.backend);
                    println!("Session:     cookie '{}', {}h", shown.security.cookie_name, shown.security.session_expiry_hours);
                    if let Err(e) = shown.validate() {
                        println!("Warning:     {}", e);
                    }
                }
            }
            Ok(())
        }
    }
}
