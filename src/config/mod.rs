use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL, used to build the OIDC redirect URI
    pub public_url: String,
    /// Where the browser lands after login and logout
    pub frontend_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: RecordBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub tables: TableNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    pub projects: String,
    pub teams: String,
    pub users: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            projects: "projects".to_string(),
            teams: "team_memberships".to_string(),
            users: "users".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BlobBackend,
    pub region: String,
    pub bucket: String,
    pub presign_expiry_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    Cognito,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub backend: IdentityBackend,
    pub client_id: String,
    pub client_secret: String,
    /// OIDC discovery document URL
    pub metadata_url: String,
    pub user_pool_id: String,
    /// Hosted login domain, used for the logout redirect
    pub domain: String,
    pub post_logout_redirect_uri: String,
    pub scopes: String,
    /// `sub|email|given_name|family_name` entries for the static provider
    pub static_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub session_secret: String,
    pub session_expiry_hours: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

const REDACTED: &str = "********";

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from `lookup`; unparsable values keep the default.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().find_map(|n| lookup(*n));
        let list = |v: String| -> Vec<String> {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        // Server overrides
        if let Some(v) = lookup("BUILDMGR_HOST") {
            self.server.host = v;
        }
        if let Some(v) = first(&["BUILDMGR_PORT", "PORT"]) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = lookup("PUBLIC_URL") {
            self.server.public_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("FRONTEND_URL") {
            self.server.frontend_url = v;
        }

        // Database overrides
        if let Some(v) = lookup("RECORD_STORE") {
            self.database.backend = match v.as_str() {
                "postgres" => RecordBackend::Postgres,
                "memory" => RecordBackend::Memory,
                _ => self.database.backend,
            };
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = first(&["DB_PROJECTS_TABLE", "DDB_PROJECTS"]) {
            self.database.tables.projects = v;
        }
        if let Some(v) = first(&["DB_TEAMS_TABLE", "DDB_TEAMS"]) {
            self.database.tables.teams = v;
        }
        if let Some(v) = first(&["DB_USERS_TABLE", "DDB_USERS"]) {
            self.database.tables.users = v;
        }

        // Storage overrides
        if let Some(v) = lookup("BLOB_STORE") {
            self.storage.backend = match v.as_str() {
                "s3" => BlobBackend::S3,
                "memory" => BlobBackend::Memory,
                _ => self.storage.backend,
            };
        }
        if let Some(v) = first(&["AWS_DEFAULT_REGION", "AWS_REGION"]) {
            self.storage.region = v;
        }
        if let Some(v) = lookup("S3_BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Some(v) = lookup("PRESIGN_EXPIRY_SECS") {
            self.storage.presign_expiry_secs = v.parse().unwrap_or(self.storage.presign_expiry_secs);
        }

        // Identity overrides
        if let Some(v) = lookup("IDENTITY_PROVIDER") {
            self.identity.backend = match v.as_str() {
                "cognito" => IdentityBackend::Cognito,
                "static" => IdentityBackend::Static,
                _ => self.identity.backend,
            };
        }
        if let Some(v) = lookup("CLIENT_ID") {
            self.identity.client_id = v;
        }
        if let Some(v) = lookup("CLIENT_SECRET") {
            self.identity.client_secret = v;
        }
        if let Some(v) = lookup("SERVER_METADATA_URL") {
            self.identity.metadata_url = v;
        }
        if let Some(v) = lookup("COGNITO_USER_POOL_ID") {
            self.identity.user_pool_id = v;
        }
        if let Some(v) = lookup("COGNITO_DOMAIN") {
            self.identity.domain = v;
        }
        if let Some(v) = lookup("POST_LOGOUT_REDIRECT_URI") {
            self.identity.post_logout_redirect_uri = v;
        }
        if let Some(v) = lookup("OIDC_SCOPES") {
            self.identity.scopes = v;
        }
        if let Some(v) = lookup("STATIC_USERS") {
            self.identity.static_users = list(v);
        }

        // Security overrides
        if let Some(v) = first(&["SESSION_SECRET", "JWT_SECRET"]) {
            self.security.session_secret = v;
        }
        if let Some(v) = lookup("SESSION_EXPIRY_HOURS") {
            self.security.session_expiry_hours = v.parse().unwrap_or(self.security.session_expiry_hours);
        }
        if let Some(v) = lookup("SESSION_COOKIE_NAME") {
            self.security.cookie_name = v;
        }
        if let Some(v) = lookup("SESSION_COOKIE_SECURE") {
            self.security.cookie_secure = v.parse().unwrap_or(self.security.cookie_secure);
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = list(v);
        }

        self
    }

    /// Check that every selected backend has what it needs to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.session_secret.trim().is_empty() {
            return Err(ConfigError::Missing("SESSION_SECRET"));
        }
        if self.security.session_expiry_hours == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_EXPIRY_HOURS",
                value: "0".to_string(),
            });
        }
        if self.database.backend == RecordBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.storage.backend == BlobBackend::S3 && self.storage.bucket.is_empty() {
            return Err(ConfigError::Missing("S3_BUCKET_NAME"));
        }
        if self.identity.backend == IdentityBackend::Cognito {
            if self.identity.client_id.is_empty() {
                return Err(ConfigError::Missing("CLIENT_ID"));
            }
            if self.identity.metadata_url.is_empty() {
                return Err(ConfigError::Missing("SERVER_METADATA_URL"));
            }
            if self.identity.user_pool_id.is_empty() {
                return Err(ConfigError::Missing("COGNITO_USER_POOL_ID"));
            }
        }
        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |s: &mut String| {
            if !s.is_empty() {
                *s = REDACTED.to_string();
            }
        };
        mask(&mut copy.identity.client_secret);
        mask(&mut copy.security.session_secret);
        if let Some(url) = copy.database.url.as_mut() {
            if let Ok(mut parsed) = url::Url::parse(url) {
                if parsed.password().is_some() && parsed.set_password(Some(REDACTED)).is_ok() {
                    *url = parsed.to_string();
                }
            }
        }
        copy
    }

    /// OIDC callback URL registered with the identity provider
    pub fn redirect_uri(&self) -> String {
        format!("{}/authorize", self.server.public_url)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                public_url: "http://localhost:5000".to_string(),
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                backend: RecordBackend::Memory,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                tables: TableNames::default(),
            },
            storage: StorageConfig {
                backend: BlobBackend::Memory,
                region: "us-east-1".to_string(),
                bucket: "buildmanager-dev".to_string(),
                presign_expiry_secs: 300,
            },
            identity: IdentityConfig {
                backend: IdentityBackend::Static,
                client_id: String::new(),
                client_secret: String::new(),
                metadata_url: String::new(),
                user_pool_id: String::new(),
                domain: String::new(),
                post_logout_redirect_uri: "http://localhost:3000".to_string(),
                scopes: "openid email profile".to_string(),
                static_users: vec!["dev-user|dev@example.com|Dev|User".to_string()],
            },
            security: SecurityConfig {
                session_secret: "dev-session-secret-change-me".to_string(),
                session_expiry_hours: 24 * 7, // 1 week
                cookie_name: "buildmgr_session".to_string(),
                cookie_secure: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                public_url: "https://api.staging.example.com".to_string(),
                frontend_url: "https://staging.example.com".to_string(),
            },
            database: DatabaseConfig {
                backend: RecordBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                tables: TableNames::default(),
            },
            storage: StorageConfig {
                backend: BlobBackend::S3,
                region: "us-east-1".to_string(),
                bucket: String::new(),
                presign_expiry_secs: 300,
            },
            identity: IdentityConfig {
                backend: IdentityBackend::Cognito,
                client_id: String::new(),
                client_secret: String::new(),
                metadata_url: String::new(),
                user_pool_id: String::new(),
                domain: String::new(),
                post_logout_redirect_uri: "https://staging.example.com".to_string(),
                scopes: "openid email profile".to_string(),
                static_users: Vec::new(),
            },
            security: SecurityConfig {
                session_secret: String::new(),
                session_expiry_hours: 24,
                cookie_name: "buildmgr_session".to_string(),
                cookie_secure: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                public_url: "https://api.example.com".to_string(),
                frontend_url: "https://app.example.com".to_string(),
            },
            database: DatabaseConfig {
                backend: RecordBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                tables: TableNames::default(),
            },
            storage: StorageConfig {
                backend: BlobBackend::S3,
                region: "us-east-1".to_string(),
                bucket: String::new(),
                presign_expiry_secs: 300,
            },
            identity: IdentityConfig {
                backend: IdentityBackend::Cognito,
                client_id: String::new(),
                client_secret: String::new(),
                metadata_url: String::new(),
                user_pool_id: String::new(),
                domain: String::new(),
                post_logout_redirect_uri: "https://app.example.com".to_string(),
                scopes: "openid email profile".to_string(),
                static_users: Vec::new(),
            },
            security: SecurityConfig {
                session_secret: String::new(),
                session_expiry_hours: 8,
                cookie_name: "buildmgr_session".to_string(),
                cookie_secure: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }

    /// In-memory backends and a fixed secret, for tests and local tooling
    pub fn for_tests() -> Self {
        let mut config = Self::development();
        config.security.session_secret = "test-session-secret".to_string();
        config.identity.static_users = Vec::new();
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

// Helper macro for environment checks
#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
