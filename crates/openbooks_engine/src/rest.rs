use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::transport::parse_base_url;

/// IRC users the backend can route searches to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerList {
    #[serde(default)]
    pub elevated_users: Vec<String>,
    #[serde(default)]
    pub regular_users: Vec<String>,
}

impl ServerList {
    /// Elevated users first, then regular users, without duplicates.
    pub fn all(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for name in self.elevated_users.iter().chain(&self.regular_users) {
            if !all.contains(name) {
                all.push(name.clone());
            }
        }
        all
    }
}

/// A previously downloaded book held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub name: String,
    pub download_link: String,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("no usable file name in {0:?}")]
    InvalidFileName(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Read-only HTTP side-channel next to the event stream.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base: Url,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let base = parse_base_url(base_url).map_err(RestError::InvalidUrl)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { client, base })
    }

    pub async fn fetch_servers(&self) -> Result<ServerList, RestError> {
        self.get_json("servers").await
    }

    pub async fn fetch_library(&self) -> Result<Vec<LibraryEntry>, RestError> {
        self.get_json("library").await
    }

    /// Download `path` (relative to the base URL) into `dest`, named after its last segment.
    pub async fn save_file(
        &self,
        path: &str,
        dest: &AtomicFileWriter,
    ) -> Result<PathBuf, RestError> {
        let name = file_name_for(path)?;
        let bytes = self.get_bytes(self.resolve(path)?).await?;
        Ok(dest.write(&name, &bytes)?)
    }

    /// Join `path` onto the base URL. Paths that name another origin are refused.
    fn resolve(&self, path: &str) -> Result<Url, RestError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| RestError::InvalidUrl(format!("{path}: {err}")))?;
        if url.origin() != self.base.origin() {
            return Err(RestError::InvalidUrl(format!(
                "{path}: outside {}",
                self.base.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<Bytes, RestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RestError::HttpStatus(status.as_u16()));
        }
        response.bytes().await.map_err(map_reqwest_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let bytes = self.get_bytes(self.resolve(path)?).await?;
        serde_json::from_slice(&bytes).map_err(|err| RestError::Decode(err.to_string()))
    }
}

/// Local file name for a server download path: its last segment, with
/// characters that are unsafe in file names replaced.
pub fn file_name_for(path: &str) -> Result<String, RestError> {
    let segment = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or_default();
    let name: String = segment
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let name = name.trim().to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(RestError::InvalidFileName(path.to_string()));
    }
    Ok(name)
}

fn map_reqwest_error(err: reqwest::Error) -> RestError {
    if err.is_timeout() {
        return RestError::Timeout;
    }
    RestError::Network(err.to_string())
}
