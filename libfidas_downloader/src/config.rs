use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::*;
use super::error::ConfigError;

/// Structure representing the downloader configuration. Contains the FTP endpoint, credentials,
/// the local target directory and the polling cadence.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub remote_dir: String,
    pub target_path: PathBuf,
    pub poll_interval_secs: u64,
    pub transfer_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub keep_staging_on_timeout: bool,
    pub file_prefix: String,
    pub timestamp_format: String,
}

impl Default for Config {
    /// Generate a new Config object. Connection fields will be empty/invalid
    fn default() -> Self {
        Self {
            host: String::from(""),
            port: DEFAULT_FTP_PORT,
            username: String::from(""),
            password: String::from(""),
            remote_dir: String::from("/"),
            target_path: PathBuf::from("None"),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            transfer_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            keep_staging_on_timeout: true,
            file_prefix: String::from(DATA_FILE_PREFIX),
            timestamp_format: String::from(DEFAULT_TIMESTAMP_FORMAT),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the values the pipeline cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("host", self.host.clone()));
        }
        if !self.target_path.is_dir() {
            return Err(ConfigError::BadFilePath(self.target_path.clone()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("poll_interval_secs", String::from("0")));
        }
        if self.transfer_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("transfer_timeout_secs", String::from("0")));
        }
        if self.file_prefix.is_empty() {
            return Err(ConfigError::InvalidValue("file_prefix", self.file_prefix.clone()));
        }
        if let Err(e) = time::format_description::parse(&self.timestamp_format) {
            return Err(ConfigError::InvalidValue("timestamp_format", e.to_string()));
        }
        Ok(())
    }

    /// `host:port` as handed to the resolver
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "host: 10.0.0.5\nusername: fidas\npassword: secret\nremote_dir: /data\n",
        )
        .unwrap();

        let config = Config::read_config_file(&path).unwrap();
        assert_eq!(config.address(), "10.0.0.5:21");
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.transfer_timeout(), Duration::from_secs(180));
        assert!(config.keep_staging_on_timeout);
        assert_eq!(config.file_prefix, "DUSTMONITOR");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::read_config_file(Path::new("/definitely/not/here.yml"));
        assert_matches!(result, Err(ConfigError::BadFilePath(_)));
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            host: String::from("10.0.0.5"),
            target_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.poll_interval_secs = 0;
        assert_matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("poll_interval_secs", _))
        );

        config.poll_interval_secs = 600;
        config.timestamp_format = String::from("[nonsense");
        assert_matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("timestamp_format", _))
        );
    }

    #[test]
    fn test_round_trip_template() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config = serde_yaml::from_str::<Config>(&yaml).unwrap();
        assert_eq!(config.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
    }
}
