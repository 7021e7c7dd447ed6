//! Configuration management for file-depot
//!
//! Settings are layered: built-in defaults, then an optional `config.toml`,
//! then environment variables prefixed with `FILE_DEPOT_`
//! (e.g. `FILE_DEPOT_STORAGE_PATH=/srv/files`).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Config files tried in order; both are optional
const CONFIG_PATHS: [&str; 2] = [
    "file-depot/config", // Docker production: /app/file-depot/config.toml
    "config",            // Local development: ./config.toml
];

const ENV_PREFIX: &str = "FILE_DEPOT";

/// Backends that can be selected with `storage_type`
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
}

/// Complete server configuration as loaded from all sources
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// IP address the command listener binds to
    pub bind_address: String,

    /// Port for the command listener
    pub port: u16,

    /// Maximum concurrent client sessions
    pub max_clients: usize,

    /// Maximum length of a single command line, in bytes
    pub max_command_length: usize,

    /// Directory holding the stored files (created if missing)
    pub storage_path: String,

    /// Storage backend
    pub storage_type: StorageType,
}

/// Settings for the network side of the server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub max_clients: usize,
    pub max_command_length: usize,
}

/// Settings for the storage backend
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_path: PathBuf,
    pub storage_type: StorageType,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 2121,
            max_clients: 16,
            max_command_length: 1024,
            storage_path: "./storage".to_string(),
            storage_type: StorageType::Local,
        }
    }
}

impl Settings {
    /// Load configuration from the default locations with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;
        for path in CONFIG_PATHS {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        Self::finish(builder)
    }

    /// Load configuration from one specific file with environment overrides
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(File::with_name(path));
        Self::finish(builder)
    }

    /// Split into the network part and the storage part
    pub fn split(self) -> (ServerSettings, StorageConfig) {
        let server = ServerSettings {
            bind_address: self.bind_address,
            port: self.port,
            max_clients: self.max_clients,
            max_command_length: self.max_command_length,
        };
        let storage = StorageConfig {
            storage_path: PathBuf::from(self.storage_path),
            storage_type: self.storage_type,
        };
        (server, storage)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Settings::default();
        Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("storage_path", defaults.storage_path)?
            .set_default("storage_type", "local")
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        if self.storage_path.trim().is_empty() {
            return Err(ConfigError::Message(
                "storage_path cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl ServerSettings {
    /// Bind address and port as a socket address string
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = path.to_string_lossy().to_string();
        (dir, path)
    }

    #[test]
    fn test_file_overrides_defaults() {
        let (_dir, path) = write_config(
            r#"
            port = 9000
            storage_path = "/var/lib/depot"
            "#,
        );

        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.storage_path, "/var/lib/depot");
        assert_eq!(settings.bind_address, "127.0.0.1");
        assert_eq!(settings.storage_type, StorageType::Local);
    }

    #[test]
    fn test_unknown_storage_type_is_rejected() {
        let (_dir, path) = write_config(r#"storage_type = "s3""#);
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let (_dir, path) = write_config("port = 0");
        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("port cannot be 0"));
    }

    #[test]
    fn test_split() {
        let (server, storage) = Settings::default().split();
        assert_eq!(server.listen_addr(), "127.0.0.1:2121");
        assert_eq!(storage.storage_path, PathBuf::from("./storage"));
        assert_eq!(storage.storage_type, StorageType::Local);
    }
}
