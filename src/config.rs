use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub loctext: LoctextConfig,
    #[serde(default)]
    pub tagger: TaggerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoctextConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoctextConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// STRING tagger service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TaggerConfig {
    #[serde(default = "default_tagger_url")]
    pub url: String,
    /// NCBI taxonomy ids whose proteins are requested
    #[serde(default = "default_protein_types")]
    pub protein_types: Vec<i64>,
    #[serde(default = "default_location_type")]
    pub location_type: i64,
    #[serde(default = "default_organism_type")]
    pub organism_type: i64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: usize,
    #[serde(default)]
    pub cache_capacity: usize,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            url: default_tagger_url(),
            protein_types: default_protein_types(),
            location_type: default_location_type(),
            organism_type: default_organism_type(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            cache_capacity: 0,
        }
    }
}

impl TaggerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Relation extraction model artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub features_path: PathBuf,
    /// 0 pairs entities within the same sentence only
    #[serde(default)]
    pub sentence_distance: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Elasticsearch,
    Sqlite,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_store_url(),
            db_path: default_db_path(),
            migrations_dir: default_migrations_dir(),
            collection: default_collection(),
            document_type: default_document_type(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch driver configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_ids_file")]
    pub ids_file: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Use revision-checked writes even when running sequentially
    #[serde(default)]
    pub conditional_writes: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            ids_file: default_ids_file(),
            concurrency: default_concurrency(),
            conditional_writes: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tagger_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_protein_types() -> Vec<i64> {
    // human, arabidopsis, yeast
    vec![9606, 3702, 4932]
}

fn default_location_type() -> i64 {
    -22
}

fn default_organism_type() -> i64 {
    -2
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_backend() -> StoreBackend {
    StoreBackend::Elasticsearch
}

fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("loctext.db")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_collection() -> String {
    "pubmed".to_string()
}

fn default_document_type() -> String {
    "paper".to_string()
}

fn default_ids_file() -> PathBuf {
    PathBuf::from("ids.txt")
}

fn default_concurrency() -> usize {
    1
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in LOCTEXT_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("LOCTEXT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.tagger.url)
            .with_context(|| format!("tagger.url is not a valid URL: {}", self.tagger.url))?;

        if self.tagger.protein_types.is_empty() {
            anyhow::bail!("tagger.protein_types must list at least one taxonomy id");
        }

        if let Some(bad) = self.tagger.protein_types.iter().find(|t| **t <= 0) {
            anyhow::bail!("tagger.protein_types must be positive taxonomy ids, got {}", bad);
        }

        if self.tagger.location_type >= 0 || self.tagger.organism_type >= 0 {
            anyhow::bail!("tagger.location_type and tagger.organism_type must be negative type ids");
        }

        if self.tagger.location_type == self.tagger.organism_type {
            anyhow::bail!("tagger.location_type and tagger.organism_type must differ");
        }

        if self.tagger.timeout_secs == 0 || self.store.timeout_secs == 0 {
            anyhow::bail!("tagger.timeout_secs and store.timeout_secs must be greater than 0");
        }

        if self.store.backend == StoreBackend::Elasticsearch {
            url::Url::parse(&self.store.url)
                .with_context(|| format!("store.url is not a valid URL: {}", self.store.url))?;
        }

        if self.store.collection.trim().is_empty() || self.store.document_type.trim().is_empty() {
            anyhow::bail!("store.collection and store.document_type must not be empty");
        }

        if self.batch.concurrency == 0 {
            anyhow::bail!("batch.concurrency must be greater than 0");
        }

        Ok(())
    }

    /// Whether merges must carry the revision they read
    pub fn conditional_writes(&self) -> bool {
        self.batch.conditional_writes || self.batch.concurrency > 1
    }
}
