use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::QueueAppConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Empty means any origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec![],
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// External similarity service used for plagiarism checks.
#[derive(Debug, Deserialize, Clone)]
pub struct PlagiarismConfig {
    /// Base URL; requests go to `{base_url}/plagiarism/check`. Default: "http://localhost:8001".
    #[serde(default = "default_plagiarism_url")]
    pub base_url: String,
    /// Request timeout in seconds. Default: 30.
    #[serde(default = "default_plagiarism_timeout")]
    pub timeout_secs: u64,
}

fn default_plagiarism_url() -> String {
    "http://localhost:8001".into()
}
fn default_plagiarism_timeout() -> u64 {
    30
}

impl Default for PlagiarismConfig {
    fn default() -> Self {
        Self {
            base_url: default_plagiarism_url(),
            timeout_secs: default_plagiarism_timeout(),
        }
    }
}

/// Limits applied when admitting code for judging.
#[derive(Debug, Deserialize, Clone)]
pub struct SubmissionConfig {
    /// Maximum source length in characters. Default: 10000.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,
    /// Languages the worker can run.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_max_code_length() -> usize {
    10_000
}
fn default_languages() -> Vec<String> {
    ["python", "cpp", "c", "java", "javascript"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_code_length: default_max_code_length(),
            languages: default_languages(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub queue: QueueAppConfig,
    #[serde(default)]
    pub plagiarism: PlagiarismConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CLASSGRADE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .add_source(File::with_name(&config_path).required(false))
            // e.g. CLASSGRADE__AUTH__JWT_SECRET, CLASSGRADE__QUEUE__URL
            .add_source(Environment::with_prefix("CLASSGRADE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
