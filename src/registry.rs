// ABOUTME: Registry v2 catalog and tag listing.
// ABOUTME: Builds API paths and decodes the JSON bodies handed back by the executor.

use crate::client::{Client, Result};
use hyper::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "v2";

/// Repository names returned by `GET /v2/_catalog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repositories {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repositories: Vec<String>,
}

/// Tags of one repository, returned by `GET /v2/{name}/tags/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

pub fn catalog_path() -> String {
    format!("/{API_VERSION}/_catalog")
}

pub fn tags_path(name: &str) -> String {
    format!("/{API_VERSION}/{name}/tags/list")
}

impl Client {
    /// List the repositories hosted by the registry.
    pub async fn catalog(&self) -> Result<Repositories> {
        self.get_json(&catalog_path()).await
    }

    /// List the tags of repository `name` (e.g. `library/alpine`).
    pub async fn tags(&self, name: &str) -> Result<Tags> {
        self.get_json(&tags_path(name)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let data = self.request(Method::GET, path, None, None).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

// Registries answer `"tags": null` for repositories without tags.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(values.unwrap_or_default())
}
