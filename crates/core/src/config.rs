use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub queue: QueueConfig,
    pub github: GitHubConfig,
    /// IANA timezone used to interpret semester interval bounds.
    pub timezone: String,
    pub semesters: BTreeMap<String, SemesterBounds>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Path the webhook sender delivers to. Everything else is a 404.
    pub path: String,
    pub debug: bool,
    /// Bound in seconds on each store upsert and queue publish call.
    pub call_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8188, path: "/".to_string(), debug: false, call_timeout: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: String::new(), database: "grader".to_string(), collection: "github".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub url: String,
    /// Key prefix shared with the downstream consumers.
    pub namespace: String,
    /// Queue that receives one event id per ingested push.
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "pushgate".to_string(),
            name: "push".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Shared webhook secret; usually supplied via `GITHUB_SECRET`.
    pub secret: String,
}

/// Raw bounds of one semester as written in the config file. Parsed and
/// validated by [`crate::semester::SemesterSchedule::from_config`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SemesterBounds {
    pub start: String,
    pub end: String,
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides
    /// for secrets and connection strings. Fails on anything the process must
    /// not start with.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let file = BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        );
        let mut config: Config = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("GITHUB_SECRET") {
            self.github.secret = secret;
        }
        if let Ok(url) = std::env::var("MONGO_URL") {
            self.db.url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.queue.url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.github.secret.is_empty() {
            bail!("Webhook secret missing: set github.secret or GITHUB_SECRET");
        }
        if self.db.url.is_empty() {
            bail!("Database URL missing: set db.url or MONGO_URL");
        }
        if self.queue.url.is_empty() {
            bail!("Queue URL missing: set queue.url or REDIS_URL");
        }
        if !self.server.path.starts_with('/') {
            bail!("server.path must start with '/', got {:?}", self.server.path);
        }
        if !self.semesters.is_empty() && self.timezone.is_empty() {
            bail!("timezone is required when semesters are configured");
        }
        Ok(())
    }
}
