//! Configuration file parser for ~/.config/podshelf/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::util::HostPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A key parsed but holds a value the program cannot run with.
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Where the catalog keeps its two records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `feeds.json` and `tags.json` in the data directory.
    #[default]
    Json,
    /// `catalog.db` in the data directory.
    Sqlite,
    /// Nothing survives the process.
    Memory,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory. `None` means `~/.local/share/podshelf`.
    pub data_dir: Option<PathBuf>,

    pub backend: Backend,

    /// Upper bound on one feed fetch, body included.
    pub fetch_timeout_secs: u64,

    /// Feeds larger than this are rejected.
    pub max_feed_bytes: usize,

    /// How many feeds `refresh --all` fetches at once.
    pub refresh_concurrency: usize,

    /// Permit feeds on loopback and private-network hosts.
    pub allow_private_hosts: bool,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: Backend::Json,
            fetch_timeout_secs: 30,
            max_feed_bytes: 10 * 1024 * 1024,
            refresh_concurrency: 4,
            allow_private_hosts: false,
            user_agent: concat!("podshelf/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "data_dir",
        "backend",
        "fetch_timeout_secs",
        "max_feed_bytes",
        "refresh_concurrency",
        "allow_private_hosts",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a huge file never lands in memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), backend = ?config.backend, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.refresh_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "refresh_concurrency",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "max_feed_bytes",
                reason: "must be at least 1".into(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "user_agent",
                reason: "must not be blank".into(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }

    /// The configured data directory, or `<home>/.local/share/podshelf`.
    pub fn data_dir_or(&self, home: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home.join(".local").join("share").join("podshelf"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("podshelf_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Json);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert_eq!(config.refresh_concurrency, 4);
        assert!(!config.allow_private_hosts);
        assert!(config.user_agent.starts_with("podshelf/"));
        assert_eq!(config.host_policy(), HostPolicy::PublicOnly);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/podshelf_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.backend, Backend::Json);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "backend = \"sqlite\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.refresh_concurrency, 4); // default
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
data_dir = "/var/lib/podshelf"
backend = "memory"
fetch_timeout_secs = 5
max_feed_bytes = 2048
refresh_concurrency = 8
allow_private_hosts = true
user_agent = "test-agent/1.0"
"#;
        let (dir, path) = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/podshelf")));
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_feed_bytes, 2048);
        assert_eq!(config.refresh_concurrency, 8);
        assert_eq!(config.host_policy(), HostPolicy::AllowPrivate);
        assert_eq!(config.user_agent, "test-agent/1.0");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_data_dir_defaults_under_home() {
        let config = Config::default();
        assert_eq!(
            config.data_dir_or(Path::new("/home/u")),
            PathBuf::from("/home/u/.local/share/podshelf")
        );
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let (dir, path) = write_config("bad_backend", "backend = \"postgres\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
backend = "json"
totally_fake_key = "should not fail"
"#;
        let (dir, path) = write_config("unknown", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Json);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (dir, path) = write_config("zero_timeout", "fetch_timeout_secs = 0\n");
        match Config::load(&path) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "fetch_timeout_secs"),
            other => panic!("Expected Invalid, got {:?}", other),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let (dir, path) = write_config("zero_concurrency", "refresh_concurrency = 0\n");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Invalid {
                key: "refresh_concurrency",
                ..
            })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
