use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Mem42Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    pub qdrant: QdrantConfig,
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `"sqlite"` (local engram table + in-process ranking) or `"qdrant"`.
    pub backend: String,
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SynthesisConfig {
    pub retrieval_limit: usize,
    pub plan_temperature: f32,
    pub synthesis_temperature: f32,
    pub engram_temperature: f32,
    /// Skip the query-optimization call when the knowledge base holds no entries.
    pub skip_optimization_when_empty: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mem42_dir()
            .join("mem42.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "sqlite".into(),
            db_path,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash".into(),
            embedding_model: "text-embedding-004".into(),
            embedding_dim: 768,
            timeout_secs: 120,
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            collection: "mem42".into(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 3,
            plan_temperature: 0.5,
            synthesis_temperature: 0.7,
            engram_temperature: 0.2,
            skip_optimization_when_empty: false,
        }
    }
}

/// Returns `~/.mem42/`, or `./.mem42/` when no home directory is available.
pub fn default_mem42_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mem42")
}

/// Returns the default config file path: `~/.mem42/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mem42_dir().join("config.toml")
}

impl Mem42Config {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            Mem42Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (GEMINI_API_KEY, QDRANT_URL, QDRANT_API_KEY,
    /// MEM42_BACKEND, MEM42_DB, MEM42_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.generation.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("QDRANT_URL") {
            self.qdrant.url = Some(val);
        }
        if let Ok(val) = std::env::var("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("MEM42_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("MEM42_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEM42_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
