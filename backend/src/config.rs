//! Configuration management for the Freight Ops backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with FOPS__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT validation configuration
    pub jwt: JwtConfig,

    /// WhatsApp gateway configuration
    pub whatsapp: WhatsAppConfig,

    /// Moodle LMS configuration
    pub moodle: MoodleConfig,

    /// Google Sheets configuration
    pub sheets: SheetsConfig,

    /// Outgoing mail configuration
    pub smtp: SmtpConfig,

    /// Document generation configuration
    pub documents: DocumentsConfig,

    /// Job queue configuration
    pub queue: QueueConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret shared with the identity service that issues tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    /// Gateway base URL, endpoints are appended to it
    pub base_url: String,

    /// Sender line the gateway sends from; the gateway default when unset
    pub from_number: Option<String>,

    /// Seconds the gateway waits before delivering
    pub sleep: u32,

    /// Country code prepended to local numbers
    pub country_code: String,

    /// Timeout for text messages, in seconds
    pub message_timeout_secs: u64,

    /// Timeout for media uploads, in seconds
    pub media_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MoodleConfig {
    /// Moodle site root, e.g. https://aula.example.com
    pub domain: String,

    /// Web service token
    pub token: String,

    /// Role id assigned to enrolled students
    pub student_role_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    /// Spreadsheet id
    pub spreadsheet_id: String,

    /// Sheet (tab) name
    pub sheet_name: String,

    /// Numeric sheet id, needed for merge requests
    pub sheet_id: i64,

    /// Path to the service-account JSON key
    pub credentials_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Directory holding text templates
    pub templates_dir: String,

    /// Scratch directory for temporary PDFs and ZIPs
    pub scratch_dir: String,

    /// Root directory inspection media paths are relative to
    pub media_root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Number of concurrent worker tasks
    pub workers: usize,

    /// Poll interval when the queue is empty, in milliseconds
    pub poll_interval_ms: u64,

    /// Default attempts per job
    pub default_max_attempts: i32,

    /// Default job timeout, in seconds
    pub default_timeout_secs: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("FOPS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("whatsapp.base_url", "https://redis.probusiness.pe/api/whatsapp")?
            .set_default("whatsapp.sleep", 0)?
            .set_default("whatsapp.country_code", shared::phone::DEFAULT_COUNTRY_CODE)?
            .set_default("whatsapp.message_timeout_secs", 30)?
            .set_default("whatsapp.media_timeout_secs", 120)?
            .set_default("moodle.domain", "")?
            .set_default("moodle.token", "")?
            .set_default("moodle.student_role_id", 5)?
            .set_default("sheets.spreadsheet_id", "")?
            .set_default("sheets.sheet_name", "Consolidado")?
            .set_default("sheets.sheet_id", 0)?
            .set_default("sheets.credentials_path", "config/google-service-account.json")?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.from", "operaciones@localhost")?
            .set_default("documents.templates_dir", "templates")?
            .set_default("documents.scratch_dir", std::env::temp_dir().to_string_lossy().to_string())?
            .set_default("documents.media_root", "storage")?
            .set_default("queue.workers", 4)?
            .set_default("queue.poll_interval_ms", 1000)?
            .set_default("queue.default_max_attempts", 3)?
            .set_default("queue.default_timeout_secs", 120)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FOPS_ prefix)
            .add_source(
                Environment::with_prefix("FOPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
