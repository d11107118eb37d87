//! Configuration module for netres
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/netres/netres.toml)
//! - User configuration (~/.netres.toml)
//! - Project configuration (./netres.toml)
//! - Environment variables
//! - Command-line arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default settings
    pub defaults: Defaults,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Extra resource tables
    pub tables: TablesConfig,

    /// Colors and output settings
    pub colors: ColorsConfig,
}

/// Default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// State used by `reconcile` when `--state` is not given
    pub state: String,

    /// Output format used when `--output` is not given
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            state: "merged".to_string(),
            output: "human".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when neither `-v` nor `RUST_LOG` is given
    pub level: String,

    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Directories of YAML resource definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub paths: Vec<PathBuf>,
}

/// Colors configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Enable colors
    pub enabled: bool,

    /// Color for added diff lines
    pub added: String,

    /// Color for removed diff lines
    pub removed: String,

    /// Color for changed results
    pub changed: String,

    /// Color for unchanged results
    pub ok: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            added: "green".to_string(),
            removed: "red".to_string(),
            changed: "yellow".to_string(),
            ok: "green".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/netres/netres.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".netres.toml"));
            paths.push(home.join(".netres/config.toml"));
        }
        paths.push(PathBuf::from("netres.toml"));

        if let Ok(env_config) = std::env::var("NETRES_CONFIG") {
            paths.insert(0, PathBuf::from(env_config));
        }
        paths
    }

    /// Merge configuration from a file
    fn merge_from_file(&self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; `other` wins where it differs
    /// from the defaults, table paths accumulate.
    fn merge(&self, other: Config) -> Config {
        let base_defaults = Defaults::default();
        let base_logging = LoggingConfig::default();
        let mut paths = self.tables.paths.clone();
        for path in other.tables.paths {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        Config {
            defaults: Defaults {
                state: if other.defaults.state != base_defaults.state {
                    other.defaults.state
                } else {
                    self.defaults.state.clone()
                },
                output: if other.defaults.output != base_defaults.output {
                    other.defaults.output
                } else {
                    self.defaults.output.clone()
                },
            },
            logging: LoggingConfig {
                level: if other.logging.level != base_logging.level {
                    other.logging.level
                } else {
                    self.logging.level.clone()
                },
                format: if other.logging.format != base_logging.format {
                    other.logging.format
                } else {
                    self.logging.format.clone()
                },
            },
            tables: TablesConfig { paths },
            colors: other.colors,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(state) = std::env::var("NETRES_STATE") {
            self.defaults.state = state;
        }

        // NETRES_TABLE_PATH is a PATH-style list
        if let Some(paths) = std::env::var_os("NETRES_TABLE_PATH") {
            for path in std::env::split_paths(&paths) {
                if !self.tables.paths.contains(&path) {
                    self.tables.paths.push(path);
                }
            }
        }

        if let Ok(format) = std::env::var("NETRES_LOG_FORMAT") {
            self.logging.format = format;
        }

        if std::env::var("NO_COLOR").is_ok() || std::env::var("NETRES_NO_COLOR").is_ok() {
            self.colors.enabled = false;
        }
    }

    /// Load from a specific file
    #[allow(dead_code)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Config::default().merge_from_file(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.state, "merged");
        assert_eq!(config.logging.level, "warn");
        assert!(!config.logging.is_json());
        assert!(config.tables.paths.is_empty());
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            tables: TablesConfig {
                paths: vec![PathBuf::from("/etc/netres/tables")],
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                state: "replaced".to_string(),
                ..Defaults::default()
            },
            tables: TablesConfig {
                paths: vec![PathBuf::from("tables")],
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.state, "replaced");
        assert_eq!(merged.defaults.output, "human");
        assert_eq!(merged.tables.paths.len(), 2);
    }

    #[test]
    fn test_load_by_extension() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "[logging]\nformat = \"json\"\n\n[tables]\npaths = [\"defs\"]").unwrap();
        let config = Config::from_file(toml_file.path()).unwrap();
        assert!(config.logging.is_json());
        assert_eq!(config.tables.paths, vec![PathBuf::from("defs")]);

        let mut yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml_file, "defaults:\n  state: overridden").unwrap();
        let config = Config::from_file(yaml_file.path()).unwrap();
        assert_eq!(config.defaults.state, "overridden");
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("NETRES_LOG_FORMAT", "json");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert!(config.logging.is_json());
        std::env::remove_var("NETRES_LOG_FORMAT");
    }
}
