//! Layered configuration for the indexer, server, and CLI.
//!
//! Supports, in increasing precedence:
//! - Built-in defaults
//! - A TOML configuration file
//! - Environment variables prefixed `GRAPHKEEP_`, double underscore for
//!   nesting: `GRAPHKEEP_INDEXING__BATCH_SIZE=64` sets `indexing.batch_size`.
//! - CLI flags, merged on top by the `cli` module where applicable.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

const LOCAL_DIR_NAME: &str = ".graphkeep";
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Base directory the graph store writes `<project_uuid>/` into.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub visit_pattern: VisitPatternConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controls which files the workspace reader visits.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct VisitPatternConfig {
    /// Non-empty means filter; empty means accept every extension.
    #[serde(default = "default_include_exts")]
    pub include_exts: Vec<String>,

    /// Matched against a directory's basename, not its full path.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for VisitPatternConfig {
    fn default() -> Self {
        Self {
            include_exts: default_include_exts(),
            exclude_dirs: default_exclude_dirs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Concurrency and retention knobs for the orchestrator.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IndexingConfig {
    /// Upper bound fed into the adaptive-concurrency formula.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Upper bound fed into the adaptive-batch-size formula.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How often the retention janitor checks for expired projects.
    #[serde(default = "default_clean_check_interval_minutes")]
    pub clean_check_interval_minutes: u64,

    /// How long an inactive workspace's code graph is retained.
    #[serde(default = "default_index_expiry_period_hours")]
    pub index_expiry_period_hours: u64,

    /// Governs the external embedding pipeline only; carried here because
    /// it's a documented configuration knob, not because this crate
    /// implements embeddings.
    #[serde(default = "default_embedding_expiry_period_days")]
    pub embedding_expiry_period_days: u64,

    /// Debounce window (ms) the event router collapses duplicate
    /// successive events for the same path within.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            batch_size: default_batch_size(),
            clean_check_interval_minutes: default_clean_check_interval_minutes(),
            index_expiry_period_hours: default_index_expiry_period_hours(),
            embedding_expiry_period_days: default_embedding_expiry_period_days(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_version() -> u32 {
    1
}
fn default_store_path() -> PathBuf {
    PathBuf::from(".graphkeep/store")
}
fn default_include_exts() -> Vec<String> {
    vec![
        "rs".into(),
        "py".into(),
        "pyi".into(),
        "js".into(),
        "jsx".into(),
        "mjs".into(),
        "ts".into(),
        "tsx".into(),
        "go".into(),
        "java".into(),
    ]
}
fn default_exclude_dirs() -> Vec<String> {
    vec![
        ".git".into(),
        "node_modules".into(),
        "dist".into(),
        "build".into(),
        "vendor".into(),
        ".idea".into(),
    ]
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}
fn default_parallelism() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    25
}
fn default_clean_check_interval_minutes() -> u64 {
    60
}
fn default_index_expiry_period_hours() -> u64 {
    72
}
fn default_embedding_expiry_period_days() -> u64 {
    7
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_bind_address() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    7878
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_path: default_store_path(),
            visit_pattern: VisitPatternConfig::default(),
            indexing: IndexingConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources: defaults, discovered/default
    /// file, then `GRAPHKEEP_`-prefixed environment variables.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(LOCAL_DIR_NAME).join(SETTINGS_FILE_NAME));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GRAPHKEEP_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Load configuration from one explicit file, ignoring the ancestor
    /// search. Used by tests and by `--config <path>`.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GRAPHKEEP_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(ConfigError::from)
    }

    /// Walk from the current directory up to the filesystem root looking
    /// for a `.graphkeep/` marker directory.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        for ancestor in current.ancestors() {
            let marker = ancestor.join(LOCAL_DIR_NAME);
            if marker.is_dir() {
                return Some(marker.join(SETTINGS_FILE_NAME));
            }
        }
        None
    }

    /// The directory containing the nearest `.graphkeep/` marker, if any.
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|a| a.join(LOCAL_DIR_NAME).is_dir())
            .map(|a| a.to_path_buf())
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let rendered = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            reason: e.to_string(),
        })?;
        std::fs::write(path, rendered).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write a default settings file at `.graphkeep/settings.toml` relative
    /// to the current directory (the `init` CLI command).
    pub fn init_config_file(force: bool) -> ConfigResult<PathBuf> {
        let config_path = PathBuf::from(LOCAL_DIR_NAME).join(SETTINGS_FILE_NAME);
        if !force && config_path.exists() {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "{} already exists; pass --force to overwrite",
                    config_path.display()
                ),
            });
        }
        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_well_formed() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.indexing.parallelism > 0);
        assert!(settings.visit_pattern.exclude_dirs.contains(&"node_modules".to_string()));
        assert_eq!(settings.visit_pattern.max_file_bytes, 1024 * 1024);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(
            &config_path,
            r#"
[indexing]
parallelism = 4
batch_size = 10

[http]
port = 9000
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.indexing.parallelism, 4);
        assert_eq!(settings.indexing.batch_size, 10);
        assert_eq!(settings.http.port, 9000);
        // untouched defaults remain
        assert_eq!(settings.indexing.index_expiry_period_hours, 72);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.parallelism = 2;
        settings.http.port = 4321;
        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.parallelism, 2);
        assert_eq!(loaded.http.port, 4321);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(&config_path, "[indexing]\nparallelism = 8\n").unwrap();

        unsafe {
            std::env::set_var("GRAPHKEEP_INDEXING__PARALLELISM", "16");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.indexing.parallelism, 16);
        unsafe {
            std::env::remove_var("GRAPHKEEP_INDEXING__PARALLELISM");
        }
    }
}
