//! # Configuration Loading
//!
//! Handles loading configuration from defaults, an optional TOML file and the environment,
//! then validates the merged result.

use crate::{config::schema::LoadGenConfig, Error, Result};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing::{debug, info};
use validator::Validate;

/// Environment variables understood without the prefix, mapped onto their config keys.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("KAFKA_BROKERS", "broker.brokers"),
    ("KAFKA_TOPIC", "broker.topic"),
    ("SCENARIO", "run.scenario"),
];

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("."), PathBuf::from("./config")];
        if let Some(dir) = dirs::config_dir() {
            search_paths.push(dir.join("surge"));
        }

        Self {
            search_paths,
            file: None,
            env_prefix: "SURGE".to_string(),
        }
    }

    /// Add a search path for configuration files
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.as_ref().to_string();
        self
    }

    /// Use a specific config file instead of searching for one
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from all available sources, reading the process environment
    pub fn load(&self) -> Result<LoadGenConfig> {
        self.load_from_vars(env::vars())
    }

    /// Load configuration using the given variables in place of the process environment
    pub fn load_from_vars<I>(&self, vars: I) -> Result<LoadGenConfig>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config_value = toml::Value::try_from(LoadGenConfig::default())
            .map_err(|e| Error::configuration(format!("Failed to serialize default config: {e}")))?;
        debug!("Applied default configuration");

        if let Some(config_path) = self.find_config_file()? {
            let file_config = load_config_file(&config_path)?;
            config_value = merge_config(config_value, file_config);
            info!(path = %config_path.display(), "Loaded configuration file");
        } else {
            debug!("No configuration file found in search paths");
        }

        for (key, value) in self.collect_env_vars(vars) {
            let parts: Vec<&str> = key.split('.').collect();
            set_nested_value(&mut config_value, &parts, value);
        }

        let config: LoadGenConfig = config_value
            .try_into()
            .map_err(|e| Error::configuration(format!("Failed to deserialize config: {e}")))?;

        config
            .validate()
            .map_err(|e| Error::configuration(format!("Invalid configuration: {e}")))?;

        debug!(?config, "Configuration loaded and validated");
        Ok(config)
    }

    /// Find the explicit file, or the first one present in the search paths
    fn find_config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(file) = &self.file {
            if !file.exists() {
                return Err(Error::configuration(format!(
                    "Config file {} does not exist",
                    file.display()
                )));
            }
            return Ok(Some(file.clone()));
        }

        for search_path in &self.search_paths {
            for name in ["surge.toml", "loadgen.toml"] {
                let config_path = search_path.join(name);
                if config_path.exists() {
                    debug!(path = %config_path.display(), "Found config file");
                    return Ok(Some(config_path));
                }
            }
        }

        Ok(None)
    }

    /// Map environment variables onto dotted config keys.
    ///
    /// `SURGE_RUN__REPORT_INTERVAL` becomes `run.report_interval`; the unprefixed aliases
    /// in [`ENV_ALIASES`] are applied first so prefixed keys win on conflict.
    fn collect_env_vars<I>(&self, vars: I) -> Vec<(String, toml::Value)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}_", self.env_prefix);
        let mut aliases = Vec::new();
        let mut prefixed = Vec::new();

        for (key, value) in vars {
            if let Some((_, config_key)) = ENV_ALIASES.iter().find(|(alias, _)| *alias == key) {
                aliases.push(((*config_key).to_string(), toml::Value::String(value)));
            } else if let Some(rest) = key.strip_prefix(&prefix) {
                let config_key = rest.to_lowercase().replace("__", ".");
                prefixed.push((config_key, parse_env_value(&value)));
            }
        }

        debug!(aliases = aliases.len(), prefixed = prefixed.len(), "Collected environment variables");
        aliases.sort_by(|a, b| a.0.cmp(&b.0));
        prefixed.sort_by(|a, b| a.0.cmp(&b.0));
        aliases.into_iter().chain(prefixed).collect()
    }

    /// Get the effective search paths being used
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Get the environment prefix being used
    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from a TOML file
fn load_config_file(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::configuration(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    content.parse::<toml::Value>().map_err(|e| {
        Error::configuration(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Merge two TOML values, tables recursively, `override_value` winning
fn merge_config(base: toml::Value, override_value: toml::Value) -> toml::Value {
    match (base, override_value) {
        (toml::Value::Table(mut base_table), toml::Value::Table(override_table)) => {
            for (key, value) in override_table {
                let merged = match base_table.remove(&key) {
                    Some(existing) if existing.is_table() && value.is_table() => {
                        merge_config(existing, value)
                    },
                    _ => value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        },
        (_, override_value) => override_value,
    }
}

/// Set a nested value, creating intermediate tables as needed
fn set_nested_value(config: &mut toml::Value, parts: &[&str], value: toml::Value) {
    let toml::Value::Table(table) = config else {
        return;
    };

    match parts {
        [] => {},
        [last] => {
            table.insert((*last).to_string(), value);
        },
        [first, rest @ ..] => {
            let entry = table
                .entry((*first).to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
            set_nested_value(entry, rest, value);
        },
    }
}

/// Parse environment variable value to appropriate TOML type
fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(bool_val) = value.parse::<bool>() {
        return toml::Value::Boolean(bool_val);
    }
    if let Ok(int_val) = value.parse::<i64>() {
        return toml::Value::Integer(int_val);
    }
    if let Ok(float_val) = value.parse::<f64>() {
        return toml::Value::Float(float_val);
    }
    toml::Value::String(value.to_string())
}
