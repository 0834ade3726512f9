// ABOUTME: Configuration types and parsing for reglist.yml.
// ABOUTME: Handles YAML parsing, discovery and conversion into a ClientConfig.

use crate::auth::AuthConfigs;
use crate::client::{ClientConfig, DEFAULT_TIMEOUT, tls};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "reglist.yml";
pub const CONFIG_FILENAME_ALT: &str = "reglist.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Connection string, e.g. `localhost:5000` or `unix:///run/registry.sock`.
    #[serde(default)]
    pub registry: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub tls: TlsSettings,

    /// Docker-style `config.json` with credentials for `get`.
    #[serde(default)]
    pub auth_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Extra CA bundle (PEM). Implies `enabled`.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl TlsSettings {
    pub fn is_enabled(&self) -> bool {
        self.enabled || self.ca_file.is_some()
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: None,
            timeout: default_timeout(),
            tls: TlsSettings::default(),
            auth_file: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {:?}", path);
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(registry) = &self.registry
            && registry.trim().is_empty()
        {
            return Err(Error::InvalidConfig("registry cannot be empty".to_string()));
        }
        Ok(())
    }

    /// The configured registry address.
    pub fn registry(&self) -> Result<&str> {
        self.registry.as_deref().ok_or(Error::MissingRegistry)
    }

    /// Client options: timeout plus TLS built from the `tls` section.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut client_config = ClientConfig::new().timeout(self.timeout);
        if let Some(ca_file) = &self.tls.ca_file {
            client_config = client_config.tls(tls::client_config_with_ca(ca_file)?);
        } else if self.tls.enabled {
            client_config = client_config.tls(tls::default_client_config()?);
        }
        Ok(client_config)
    }

    /// Credentials from `auth_file`, empty when none is configured.
    pub fn auth_configs(&self) -> Result<AuthConfigs> {
        match &self.auth_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Ok(AuthConfigs::from_docker_config(&content)?)
            }
            None => Ok(AuthConfigs::default()),
        }
    }
}
