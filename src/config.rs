use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use finsync_core::SyncSettings;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Latency bounds of the simulated remote, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub min: u64,
    pub max: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            min: 1000,
            max: 3000,
        }
    }
}

/// Sync section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync after write commands (default: true)
    pub auto_sync: bool,
    /// Treat the host as disconnected
    pub offline: bool,
    /// Upper bound on one remote exchange
    pub timeout_secs: u64,
    pub auto_save_interval_secs: u64,
    pub latency_ms: LatencyConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            offline: false,
            timeout_secs: 15,
            auto_save_interval_secs: 30,
            latency_ms: LatencyConfig::default(),
        }
    }
}

/// Binding section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub debounce_ms: u64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding one JSON file per stored key
    pub data_dir: ConfigValue<PathBuf>,
    /// Whether the host starts disconnected
    pub offline: ConfigValue<bool>,
    pub sync_timeout_secs: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncConfig,
    pub binding: BindingConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    sync: Option<SyncConfig>,
    binding: Option<BindingConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();
        let mut binding = BindingConfig::default();
        let mut offline = ConfigValue::new(sync.offline, ConfigSource::Default);
        let mut sync_timeout_secs = ConfigValue::new(sync.timeout_secs, ConfigSource::Default);

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                if sync_config.auto_save_interval_secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        path.clone(),
                        "sync.auto_save_interval_secs must be at least 1".to_string(),
                    ));
                }
                offline = ConfigValue::new(sync_config.offline, ConfigSource::File);
                sync_timeout_secs = ConfigValue::new(sync_config.timeout_secs, ConfigSource::File);
                sync = sync_config;
            }
            if let Some(binding_config) = file_config.binding {
                binding = binding_config;
            }
        }

        if let Ok(dir) = std::env::var("FINSYNC_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(raw) = std::env::var("FINSYNC_OFFLINE") {
            let value = parse_bool(&raw)
                .ok_or_else(|| ConfigError::InvalidEnv("FINSYNC_OFFLINE", raw.clone()))?;
            offline = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Ok(raw) = std::env::var("FINSYNC_SYNC_TIMEOUT_SECS") {
            let value = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("FINSYNC_SYNC_TIMEOUT_SECS", raw.clone()))?;
            sync_timeout_secs = ConfigValue::new(value, ConfigSource::Environment);
        }

        Ok(Self {
            data_dir,
            offline,
            sync_timeout_secs,
            config_file,
            sync,
            binding,
        })
    }

    /// Applies the `--offline` flag.
    pub fn force_offline(&mut self) {
        self.offline = ConfigValue::new(true, ConfigSource::CommandLine);
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            sync_timeout: Duration::from_secs(self.sync_timeout_secs.value),
            auto_save_interval: Duration::from_secs(self.sync.auto_save_interval_secs),
            ..SyncSettings::default()
        }
    }

    pub fn latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.sync.latency_ms.min),
            Duration::from_millis(self.sync.latency_ms.max),
        )
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/finsync/
    /// - macOS: ~/Library/Application Support/finsync/
    /// - Windows: %APPDATA%/finsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/finsync/
    /// - macOS: ~/Library/Application Support/finsync/
    /// - Windows: %APPDATA%/finsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("finsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
    InvalidValue(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
            ConfigError::InvalidValue(path, reason) => {
                write!(f, "Invalid config file '{}': {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config.data_dir.value.ends_with("finsync"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert!(!config.offline.value);
        assert_eq!(config.sync_timeout_secs.value, 15);
        assert!(config.sync.auto_sync);
        assert_eq!(config.binding.debounce_ms, 1000);
        assert_eq!(config.config_file, None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/finance").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  auto_sync: false").unwrap();
        writeln!(file, "  offline: true").unwrap();
        writeln!(file, "  timeout_secs: 5").unwrap();
        writeln!(file, "  latency_ms:").unwrap();
        writeln!(file, "    min: 0").unwrap();
        writeln!(file, "    max: 10").unwrap();
        writeln!(file, "binding:").unwrap();
        writeln!(file, "  debounce_ms: 250").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/finance"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert!(config.offline.value);
        assert_eq!(config.offline.source, ConfigSource::File);
        assert!(!config.sync.auto_sync);
        assert_eq!(config.sync_settings().sync_timeout, Duration::from_secs(5));
        assert_eq!(config.latency(), (Duration::ZERO, Duration::from_millis(10)));
        assert_eq!(config.binding.debounce_ms, 250);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: data\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: /from/file\n").unwrap();

        std::env::set_var("FINSYNC_DATA_DIR", "/from/env");
        std::env::set_var("FINSYNC_OFFLINE", "yes");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/from/env"));
        assert_eq!(config.data_dir.source, ConfigSource::Environment);
        assert!(config.offline.value);

        std::env::remove_var("FINSYNC_DATA_DIR");
        std::env::remove_var("FINSYNC_OFFLINE");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_zero_auto_save_interval_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync:\n  auto_save_interval_secs: 0\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("auto_save_interval_secs"));
    }

    #[test]
    fn test_force_offline() {
        let temp_dir = tempdir().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();

        config.force_offline();

        assert!(config.offline.value);
        assert_eq!(config.offline.source, ConfigSource::CommandLine);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
