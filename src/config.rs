//! Configuration management for aeroread.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AeroreadError, Result};

/// Command-line arguments for aeroread
#[derive(Parser, Debug)]
#[command(name = "aeroread")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Root directories containing model output (one subdirectory per model)
    #[arg(short, long, env = "AEROREAD_MODEL_ROOT")]
    pub model_root: Vec<PathBuf>,

    /// Root directories containing observation networks
    #[arg(short, long, env = "AEROREAD_OBS_ROOT")]
    pub obs_root: Vec<PathBuf>,

    /// Directory for the binary observation read-cache
    #[arg(long, env = "AEROREAD_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// File naming convention to assume (aerocom2, aerocom3); inferred per
    /// model directory when omitted
    #[arg(long, env = "AEROREAD_CONVENTION")]
    pub convention: Option<String>,

    /// Maximum worker threads for multi-model reads
    #[arg(short, long, env = "AEROREAD_WORKERS")]
    pub workers: Option<usize>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "AEROREAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AEROREAD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Subcommands of the aeroread CLI
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List model directories found under the model roots
    Models,
    /// List the data files of one model, grouped by variable
    Files {
        /// Model data id
        data_id: String,
    },
    /// Read one variable of one or more models over a year range
    Read {
        /// Comma-separated model data ids
        data_ids: String,
        /// Variable name
        var_name: String,
        /// First year to include
        start_year: i32,
        /// Last year to include
        stop_year: i32,
        /// Crop the result to a named region
        #[arg(long)]
        region: Option<String>,
    },
    /// Read an observation network variable, using the read-cache
    Obs {
        /// Network name (AeronetSunV3, AeronetSdaV3)
        network: String,
        /// Variable name
        var_name: String,
        /// Ignore the cache and re-parse the raw files
        #[arg(long)]
        force_raw: bool,
    },
    /// List the registered named regions
    Regions,
}

/// Search path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directories containing one subdirectory per model
    #[serde(default)]
    pub model_roots: Vec<PathBuf>,

    /// Root directories containing one subdirectory per observation network
    #[serde(default)]
    pub obs_roots: Vec<PathBuf>,

    /// Directory holding binary read-cache entries
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

/// Read behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// File naming convention to assume (None = infer per directory)
    #[serde(default)]
    pub convention: Option<String>,

    /// Maximum worker threads for multi-model reads
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search paths
    #[serde(default)]
    pub paths: PathsConfig,

    /// Read behaviour
    #[serde(default)]
    pub read: ReadConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load(args: &Args) -> Result<Self> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments
        if !args.model_root.is_empty() {
            config.paths.model_roots = args.model_root.clone();
        }
        if !args.obs_root.is_empty() {
            config.paths.obs_roots = args.obs_root.clone();
        }
        if let Some(cache_dir) = &args.cache_dir {
            config.paths.cache_dir = cache_dir.clone();
        }
        if args.convention.is_some() {
            config.read.convention = args.convention.clone();
        }
        if let Some(workers) = args.workers {
            config.read.max_workers = workers;
        }
        config.log_level = args.log_level.clone();

        Ok(config)
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if !other.paths.model_roots.is_empty() {
            self.paths.model_roots = other.paths.model_roots;
        }
        if !other.paths.obs_roots.is_empty() {
            self.paths.obs_roots = other.paths.obs_roots;
        }
        self.paths.cache_dir = other.paths.cache_dir;
        if other.read.convention.is_some() {
            self.read.convention = other.read.convention;
        }
        self.read.max_workers = other.read.max_workers;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.read.max_workers == 0 {
            return Err(AeroreadError::Config {
                message: "max_workers cannot be 0".to_string(),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(AeroreadError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        // Validate the convention name, if pinned
        if let Some(name) = &self.read.convention {
            crate::convention::FileConvention::import_default(name)?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            read: ReadConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_roots: Vec::new(),
            obs_roots: Vec::new(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            convention: None,
            max_workers: default_max_workers(),
        }
    }
}

// Default value functions for serde
fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("aeroread_cache")
}

fn default_max_workers() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.paths.model_roots.is_empty());
        assert_eq!(config.read.max_workers, 4);
        assert!(config.read.convention.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = Config::default();
        let mut config2 = Config::default();

        config2.paths.model_roots = vec![PathBuf::from("/data/models")];
        config2.read.max_workers = 8;
        config2.read.convention = Some("aerocom3".to_string());

        config1.merge(config2);

        assert_eq!(config1.paths.model_roots, vec![PathBuf::from("/data/models")]);
        assert_eq!(config1.read.max_workers, 8);
        assert_eq!(config1.read.convention.as_deref(), Some("aerocom3"));
    }

    #[test]
    fn test_config_validation() {
        // Valid config should pass
        let config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid worker count
        let mut config = Config::default();
        config.read.max_workers = 0;
        assert!(config.validate().is_err());

        // Test invalid log level
        let mut config = Config::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        // Test unknown convention name
        let mut config = Config::default();
        config.read.convention = Some("aerocom9".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "paths": { "model_roots": ["/data/models"] },
                "read": { "convention": "aerocom2", "max_workers": 2 },
                "log_level": "debug"
            }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.paths.model_roots, vec![PathBuf::from("/data/models")]);
        assert_eq!(config.read.convention.as_deref(), Some("aerocom2"));
        assert_eq!(config.read.max_workers, 2);
        assert_eq!(config.log_level, "debug");
        assert!(config.validate().is_ok());
    }
}
