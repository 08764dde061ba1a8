use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use healthpod_core::DEFAULT_POD_ROOT;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
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

/// Remote pod settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodConfig {
    /// Pod server URL (e.g., "http://localhost:8080")
    pub server_url: Option<String>,
    /// API key for the pod server (never written out by `config show`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory for the record cache and the local pod
    pub data_dir: ConfigValue<PathBuf>,
    /// Pod directory holding the feature directories
    pub pod_root: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Remote pod configuration
    pub pod: PodConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    pod_root: Option<String>,
    pod: Option<PodConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut pod_root = ConfigValue::new(DEFAULT_POD_ROOT.to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut pod = PodConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            // A file holding only comments is an empty document.
            let file_config: ConfigFile = serde_yaml::from_str::<Option<ConfigFile>>(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?
                .unwrap_or_default();

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
            if let Some(root) = file_config.pod_root {
                pod_root = ConfigValue::new(root, ConfigSource::File);
            }
            if let Some(pod_config) = file_config.pod {
                pod = pod_config;
            }
        }

        if let Ok(dir) = std::env::var("HEALTHPOD_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(root) = std::env::var("HEALTHPOD_POD_ROOT") {
            pod_root = ConfigValue::new(root, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("HEALTHPOD_POD_URL") {
            pod.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("HEALTHPOD_API_KEY") {
            pod.api_key = Some(key);
        }

        Ok(Self {
            data_dir,
            pod_root,
            config_file,
            pod,
        })
    }

    /// Directory used as the pod when no server is configured.
    pub fn local_pod_dir(&self) -> PathBuf {
        self.data_dir.value.join("pod")
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/healthpod/
    /// - macOS: ~/Library/Application Support/healthpod/
    /// - Windows: %APPDATA%/healthpod/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("healthpod")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/healthpod/
    /// - macOS: ~/Library/Application Support/healthpod/
    /// - Windows: %APPDATA%/healthpod/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("healthpod")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
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
        assert!(config.data_dir.value.ends_with("healthpod"));
        assert_eq!(config.data_dir.source, ConfigSource::Default);
        assert_eq!(config.pod_root.value, "healthpod/data");
        assert_eq!(config.pod_root.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "data_dir: /custom/healthpod").unwrap();
        writeln!(file, "pod_root: records").unwrap();
        writeln!(file, "pod:").unwrap();
        writeln!(file, "  server_url: http://pod.example.com").unwrap();
        writeln!(file, "  api_key: secret").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/healthpod"));
        assert_eq!(config.data_dir.source, ConfigSource::File);
        assert_eq!(config.pod_root.value, "records");
        assert_eq!(config.pod_root.source, ConfigSource::File);
        assert_eq!(
            config.pod.server_url.as_deref(),
            Some("http://pod.example.com")
        );
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: data\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("data"));
        assert_eq!(config.local_pod_dir(), temp_dir.path().join("data").join("pod"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "pod_root: fromfile\n").unwrap();

        std::env::set_var("HEALTHPOD_POD_ROOT", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.pod_root.value, "fromenv");
        assert_eq!(config.pod_root.source, ConfigSource::Environment);

        std::env::remove_var("HEALTHPOD_POD_ROOT");
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
    fn test_api_key_not_serialized() {
        let pod = PodConfig {
            server_url: Some("http://localhost:8080".into()),
            api_key: Some("secret".into()),
        };
        let yaml = serde_yaml::to_string(&pod).unwrap();
        assert!(yaml.contains("server_url"));
        assert!(!yaml.contains("secret"));
    }
}
