//! Configuration module for the embedding index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.coderag/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CODERAG_` and use double
//! underscores to separate nested levels:
//! - `CODERAG_SEARCH__DEFAULT_K=20` sets `search.default_k`
//! - `CODERAG_PROVIDER__MODEL=BGESmallENV15` sets `provider.model`
//! - `CODERAG_LOGGING__LEVEL=debug` sets `logging.level`

use crate::error::ConfigError;
use crate::semantic::{DEFAULT_K, DEFAULT_MAX_PER_FILE, RankingConfig, SearchOptions};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the settings file, found by walking up from the cwd
pub const CONFIG_DIR: &str = ".coderag";

const CONFIG_FILE: &str = "settings.toml";

const ENV_PREFIX: &str = "CODERAG_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Relevance ranking weights
    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Root directory for repository indexes, relative to the workspace root
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Identifier of the indexed repository (defaults to the workspace root path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Number of results returned by default
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Similarity threshold; unset keeps every candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,

    /// Per-file cap for diverse search
    #[serde(default = "default_max_per_file")]
    pub max_per_file: usize,

    /// Apply relevance ranking to every search
    #[serde(default)]
    pub enable_ranking: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    /// fastembed model used for query embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded models are cached
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g. "warn", "coderag=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_root_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("embeddings")
}
fn default_k() -> usize {
    DEFAULT_K
}
fn default_max_per_file() -> usize {
    DEFAULT_MAX_PER_FILE
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_models_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join("models"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models"))
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            storage: StorageConfig::default(),
            search: SearchConfig::default(),
            ranking: RankingConfig::default(),
            provider: ProviderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            repository_id: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            min_similarity: None,
            max_per_file: default_max_per_file(),
            enable_ranking: false,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            models_dir: default_models_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the store and search engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.default_k == 0 {
            return Err(ConfigError::Invalid {
                reason: "search.default_k must be at least 1".to_string(),
            });
        }
        if self.search.max_per_file == 0 {
            return Err(ConfigError::Invalid {
                reason: "search.max_per_file must be at least 1".to_string(),
            });
        }
        if let Some(min) = self.search.min_similarity {
            if !(-1.0..=1.0).contains(&min) {
                return Err(ConfigError::Invalid {
                    reason: format!("search.min_similarity must be within [-1, 1], got {min}"),
                });
            }
        }
        self.ranking.validate()
    }

    /// Find the workspace config by looking for a .coderag directory
    /// from the current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .coderag is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Storage root resolved against the workspace root (or the cwd)
    pub fn storage_root(&self) -> PathBuf {
        if self.storage.root_dir.is_absolute() {
            return self.storage.root_dir.clone();
        }
        Self::workspace_root()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
            .join(&self.storage.root_dir)
    }

    /// Identifier of the indexed repository.
    ///
    /// Falls back to the workspace root path, then the current directory.
    pub fn repository_id(&self) -> String {
        if let Some(id) = &self.storage.repository_id {
            return id.clone();
        }
        Self::workspace_root()
            .or_else(|| std::env::current_dir().ok())
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| ".".to_string())
    }

    /// Search options seeded from the `[search]` section
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            k: self.search.default_k,
            min_similarity: self.search.min_similarity,
            filters: None,
            enable_ranking: self.search.enable_ranking,
            boost_tags: Vec::new(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments in `dir`
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# coderag configuration file

# Version of the configuration schema
version = 1

# Global debug mode (forces debug logging)
debug = false

[storage]
# Root directory for repository indexes (relative to the workspace root)
root_dir = '{root_dir}'

# Identifier of the indexed repository, defaults to the workspace root path
# repository_id = "my-project"

[search]
# Number of results returned by default
default_k = {default_k}

# Drop results below this cosine similarity (unset keeps everything)
# min_similarity = 0.4

# Maximum results per file for diverse search
max_per_file = {max_per_file}

# Combine similarity with recency, tags and complexity
enable_ranking = false

[ranking]
similarity_weight = {similarity_weight}
recency_weight = {recency_weight}
tag_weight = {tag_weight}
complexity_weight = {complexity_weight}
# Age in days at which the recency factor halves
recency_half_life_days = {half_life:.1}

[provider]
# fastembed model used to embed queries
# Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15,
# BGELargeENV15, NomicEmbedTextV15, MultilingualE5Small, MultilingualE5Base,
# MultilingualE5Large
model = "{model}"

# Where downloaded models are cached
models_dir = '{models_dir}'

[logging]
# Default log filter when RUST_LOG is unset
level = "{level}"
"#,
            root_dir = defaults.storage.root_dir.display(),
            default_k = defaults.search.default_k,
            max_per_file = defaults.search.max_per_file,
            similarity_weight = defaults.ranking.similarity_weight,
            recency_weight = defaults.ranking.recency_weight,
            tag_weight = defaults.ranking.tag_weight,
            complexity_weight = defaults.ranking.complexity_weight,
            half_life = defaults.ranking.recency_half_life_days,
            model = defaults.provider.model,
            models_dir = defaults.provider.models_dir.display(),
            level = defaults.logging.level,
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
