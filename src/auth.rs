// ABOUTME: Registry credential records keyed by server address.
// ABOUTME: Mirrors the Docker config.json "auths" layout; not applied to requests automatically.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth field is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("auth field is not valid UTF-8")]
    InvalidUtf8,

    #[error("auth field must have the form username:password")]
    MissingSeparator,
}

/// Authorization information for connecting to a registry.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Base64 of `username:password`.
    #[serde(default)]
    pub auth: String,

    #[serde(default)]
    pub email: String,

    #[serde(
        default,
        rename = "serveraddress",
        skip_serializing_if = "String::is_empty"
    )]
    pub server_address: String,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let password = password.into();
        let auth = STANDARD.encode(format!("{username}:{password}"));
        Self {
            username,
            password,
            auth,
            ..Default::default()
        }
    }

    /// Username and password, from the explicit fields or the encoded `auth`.
    pub fn credentials(&self) -> Result<Option<(String, String)>, AuthError> {
        if !self.username.is_empty() {
            return Ok(Some((self.username.clone(), self.password.clone())));
        }
        if self.auth.is_empty() {
            return Ok(None);
        }

        let decoded = STANDARD.decode(self.auth.trim())?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidUtf8)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::MissingSeparator)?;
        Ok(Some((username.to_string(), password.to_string())))
    }

    /// `Authorization` header value for basic auth, if any credentials are present.
    pub fn authorization_header(&self) -> Result<Option<String>, AuthError> {
        Ok(self.credentials()?.map(|(username, password)| {
            format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
        }))
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("auth", &redact(&self.auth))
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// Credentials keyed by registry server address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthConfigs(HashMap<String, AuthConfig>);

#[derive(Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: AuthConfigs,
}

impl AuthConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a plain JSON object of server address to credentials.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parse the `auths` section of a Docker `config.json`.
    pub fn from_docker_config(json: &str) -> serde_json::Result<Self> {
        let file: DockerConfigFile = serde_json::from_str(json)?;
        Ok(file.auths)
    }

    pub fn insert(&mut self, server: impl Into<String>, config: AuthConfig) -> Option<AuthConfig> {
        self.0.insert(server.into(), config)
    }

    pub fn get(&self, server: &str) -> Option<&AuthConfig> {
        self.0.get(server)
    }

    /// Find credentials for a registry address, ignoring scheme and trailing
    /// slashes on either side.
    pub fn find(&self, registry: &str) -> Option<&AuthConfig> {
        if let Some(config) = self.0.get(registry) {
            return Some(config);
        }
        let wanted = normalize_server(registry);
        self.0
            .iter()
            .find(|(server, _)| normalize_server(server) == wanted)
            .map(|(_, config)| config)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AuthConfig)> {
        self.0.iter()
    }
}

fn normalize_server(server: &str) -> &str {
    let server = server
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(server);
    server.trim_end_matches('/')
}
