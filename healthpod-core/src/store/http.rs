//! HTTP client for a remote pod server.
//!
//! Speaks the `healthpod-server` protocol:
//! - `GET /dir/<path>` returns a JSON [`DirListing`]
//! - `GET /blob/<path>` returns the blob content
//! - `PUT /blob/<path>` stores the request body (`X-Pod-Encrypted` header)
//! - `DELETE /blob/<path>` removes the blob
//!
//! All requests carry `Authorization: Bearer <api_key>`.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};

use super::{path_segments, DirListing, PodStore, StoreError};

/// Header telling the server whether the blob should be stored encrypted.
pub const ENCRYPTED_HEADER: &str = "X-Pod-Encrypted";

#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the URL for a route and pod path, percent-encoding each segment.
    fn url(&self, route: &str, path: &str) -> Result<String, StoreError> {
        let encoded: Vec<String> = path_segments(path)?
            .into_iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        if encoded.is_empty() {
            Ok(format!("{}/{}", self.base_url, route))
        } else {
            Ok(format!("{}/{}/{}", self.base_url, route, encoded.join("/")))
        }
    }

    fn api_key(&self) -> Result<&str, StoreError> {
        self.api_key.as_deref().ok_or(StoreError::NotLoggedIn)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(self.api_key()?)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        check_status(response, path)
    }
}

fn check_status(response: Response, path: &str) -> Result<Response, StoreError> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::NotLoggedIn),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_string())),
        StatusCode::BAD_REQUEST => Err(StoreError::InvalidPath(path.to_string())),
        s if s.is_server_error() => Err(StoreError::Unavailable(format!(
            "Server returned status {}",
            s
        ))),
        s => Err(StoreError::Rejected(format!("Server returned status {}", s))),
    }
}

#[async_trait]
impl PodStore for HttpStore {
    async fn ensure_logged_in(&self) -> Result<(), StoreError> {
        self.api_key().map(|_| ())
    }

    async fn list_directory(&self, path: &str) -> Result<DirListing, StoreError> {
        let url = self.url("dir", path)?;
        let response = self.send(self.client.get(&url), path).await?;
        response
            .json::<DirListing>()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn read_blob(&self, path: &str) -> Result<String, StoreError> {
        let url = self.url("blob", path)?;
        let response = self.send(self.client.get(&url), path).await?;
        response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn write_blob(
        &self,
        path: &str,
        content: &str,
        encrypted: bool,
    ) -> Result<(), StoreError> {
        let url = self.url("blob", path)?;
        let request = self
            .client
            .put(&url)
            .header(ENCRYPTED_HEADER, encrypted.to_string())
            .body(content.to_string());
        self.send(request, path).await?;
        Ok(())
    }

    async fn delete_blob(&self, path: &str) -> Result<(), StoreError> {
        let url = self.url("blob", path)?;
        self.send(self.client.delete(&url), path).await?;
        Ok(())
    }
}
