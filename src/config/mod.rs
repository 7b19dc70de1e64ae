use crate::error::{Result, VigiaError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".vigia";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_BASE_URL: &str = "https://boletines.tribunalqro.gob.mx";
const DEFAULT_STORE_FILE: &str = "vigia.db";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database. Defaults to ~/.vigia/vigia.db.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL of the bulletin archive
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Politeness delay between source requests, milliseconds
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_throttle_ms() -> u64 {
    1500
}

fn default_user_agent() -> String {
    format!("vigia/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            throttle_ms: default_throttle_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| VigiaError::Config("Could not determine home directory".to_string()))?;

        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Get the configuration file full path
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_path()?.join(CONFIG_FILE_NAME))
    }

    /// Resolve the store path, falling back to the default location
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_path()?.join(DEFAULT_STORE_FILE)),
        }
    }

    /// Initialize configuration directory and file
    pub fn initialize() -> Result<()> {
        let config_dir = Self::config_path()?;

        // Create config directory with restricted permissions
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                VigiaError::Config(format!("Failed to create config directory: {}", e))
            })?;

            // Set directory permissions to 0700 on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let permissions = fs::Permissions::from_mode(0o700);
                fs::set_permissions(&config_dir, permissions).map_err(|e| {
                    VigiaError::Config(format!("Failed to set directory permissions: {}", e))
                })?;
            }
        }

        let config_file = Self::config_file_path()?;

        // Create default config file if it doesn't exist
        if !config_file.exists() {
            let default_config = Self::default();
            let yaml = serde_yaml::to_string(&default_config)
                .map_err(|e| VigiaError::Config(format!("Failed to serialize config: {}", e)))?;

            fs::write(&config_file, yaml)
                .map_err(|e| VigiaError::Config(format!("Failed to write config file: {}", e)))?;

            // Set file permissions to 0600 on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let permissions = fs::Permissions::from_mode(0o600);
                fs::set_permissions(&config_file, permissions).map_err(|e| {
                    VigiaError::Config(format!("Failed to set file permissions: {}", e))
                })?;
            }
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::initialize()?;

        let config_file = Self::config_file_path()?;
        let contents = fs::read_to_string(&config_file)
            .map_err(|e| VigiaError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| VigiaError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        Self::initialize()?;

        let config_file = Self::config_file_path()?;
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| VigiaError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_file, yaml)
            .map_err(|e| VigiaError::Config(format!("Failed to write config file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&config_file, permissions)
                .map_err(|e| VigiaError::Config(format!("Failed to set file permissions: {}", e)))?;
        }

        Ok(())
    }

    /// Set a configuration value by key path
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "store.path" => {
                self.store.path = Some(PathBuf::from(value));
            }
            "fetch.base_url" => {
                self.fetch.base_url = value.to_string();
            }
            "fetch.timeout" => {
                self.fetch.timeout = value
                    .parse()
                    .map_err(|_| VigiaError::Config(format!("Invalid timeout: {}", value)))?;
            }
            "fetch.throttle_ms" => {
                self.fetch.throttle_ms = value
                    .parse()
                    .map_err(|_| VigiaError::Config(format!("Invalid throttle: {}", value)))?;
            }
            "fetch.user_agent" => {
                self.fetch.user_agent = value.to_string();
            }
            _ => {
                return Err(VigiaError::Config(format!(
                    "Unknown configuration key: {}",
                    key
                )));
            }
        }

        self.save()?;
        Ok(())
    }

    /// Get a configuration value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "store.path" => self
                .store
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            "fetch.base_url" => Some(self.fetch.base_url.clone()),
            "fetch.timeout" => Some(self.fetch.timeout.to_string()),
            "fetch.throttle_ms" => Some(self.fetch.throttle_ms.to_string()),
            "fetch.user_agent" => Some(self.fetch.user_agent.clone()),
            _ => None,
        }
    }
}
