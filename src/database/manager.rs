use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, TableNames};

/// Errors from the record store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the PostgreSQL pool and the table layout
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
    tables: TableNames,
}

impl DatabaseManager {
    /// Connect using `config`. Table names are validated before any SQL runs.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        for name in [&config.tables.projects, &config.tables.teams, &config.tables.users] {
            if !Self::is_valid_table_name(name) {
                return Err(DatabaseError::InvalidTableName(name.clone()));
            }
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool ({} max connections)", config.max_connections);
        Ok(Self {
            pool,
            tables: config.tables.clone(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Quoted table identifiers, in (projects, teams, users) order
    pub fn quoted_tables(&self) -> (String, String, String) {
        (
            Self::quote_identifier(&self.tables.projects),
            Self::quote_identifier(&self.tables.teams),
            Self::quote_identifier(&self.tables.users),
        )
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        for statement in Self::schema_statements(&self.tables) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        info!(
            "Schema ready: {}, {}, {}",
            self.tables.projects, self.tables.teams, self.tables.users
        );
        Ok(())
    }

    fn schema_statements(tables: &TableNames) -> Vec<String> {
        let projects = Self::quote_identifier(&tables.projects);
        let teams = Self::quote_identifier(&tables.teams);
        let users = Self::quote_identifier(&tables.users);
        let owner_idx = Self::quote_identifier(&format!("{}_owner_idx", tables.projects));
        let user_idx = Self::quote_identifier(&format!("{}_user_idx", tables.teams));

        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    project_id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    record JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
                projects
            ),
            format!("CREATE INDEX IF NOT EXISTS {} ON {} (owner_id)", owner_idx, projects),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    project_id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    added_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (project_id, user_id)
                )",
                teams
            ),
            format!("CREATE INDEX IF NOT EXISTS {} ON {} (user_id)", user_idx, teams),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    user_id TEXT PRIMARY KEY,
                    given_name TEXT NOT NULL,
                    family_name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    synced_at TIMESTAMPTZ
                )",
                users
            ),
        ]
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    /// Quote SQL identifier to prevent injection
    pub(crate) fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Table names come from the environment, so they are restricted to
    /// `[A-Za-z_][A-Za-z0-9_]*` and PostgreSQL's 63-byte identifier limit
    /// (leaving room for index suffixes).
    fn is_valid_table_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        name.len() <= 52 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_table_names() {
        assert!(DatabaseManager::is_valid_table_name("projects"));
        assert!(DatabaseManager::is_valid_table_name("_team_memberships_2"));
        assert!(!DatabaseManager::is_valid_table_name("2projects"));
        assert!(!DatabaseManager::is_valid_table_name("projects-prod"));
        assert!(!DatabaseManager::is_valid_table_name("projects; DROP TABLE users"));
        assert!(!DatabaseManager::is_valid_table_name(""));
        assert!(!DatabaseManager::is_valid_table_name(&"x".repeat(60)));
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(DatabaseManager::quote_identifier("projects"), "\"projects\"");
        assert_eq!(DatabaseManager::quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn schema_uses_configured_tables() {
        let tables = TableNames {
            projects: "bm_projects".to_string(),
            teams: "bm_teams".to_string(),
            users: "bm_users".to_string(),
        };
        let statements = DatabaseManager::schema_statements(&tables);
        assert_eq!(statements.len(), 5);
        assert!(statements[0].contains("\"bm_projects\""));
        assert!(statements[1].contains("\"bm_projects_owner_idx\""));
        assert!(statements[2].contains("PRIMARY KEY (project_id, user_id)"));
        assert!(statements[4].contains("\"bm_users\""));
    }

    #[tokio::test]
    async fn connect_requires_url() {
        let config = crate::config::AppConfig::for_tests().database;
        assert!(matches!(
            DatabaseManager::connect(&config).await,
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }
}
