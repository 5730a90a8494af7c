//! HTTP storage backend
//!
//! Reads a catalog published behind a static HTTP server, e.g.
//! `https://catalog.example.org/catalog.json`. The backend is read-only.
//!
//! ## Security
//!
//! Every path segment is URL-encoded, and segments that would escape the
//! base URL ("..", ".") are rejected.

use super::{StorageBackend, StorageError};
use async_trait::async_trait;
use tracing::debug;

/// Read-only storage backend over HTTP
pub struct HttpStorageBackend {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpStorageBackend {
    /// Create a backend for the catalog at `base_url`
    ///
    /// # Example
    ///
    /// ```rust
    /// use owid_catalog::storage::http::HttpStorageBackend;
    ///
    /// let backend = HttpStorageBackend::new("https://catalog.example.org/", None);
    /// assert_eq!(backend.base_url(), "https://catalog.example.org");
    /// ```
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a catalog path with every segment encoded
    fn url_for(&self, path: &str) -> Result<String, StorageError> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(StorageError::PermissionDenied(
                    "Path traversal not allowed".to_string(),
                ));
            }
            segments.push(urlencoding::encode(segment).into_owned());
        }
        Ok(format!("{}/{}", self.base_url, segments.join("/")))
    }

    /// Build a request with authentication headers
    fn build_request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, StorageError> {
        let url = self.url_for(path)?;
        debug!("{} {}", method, url);
        let mut request = self.client.request(method, &url);

        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        Ok(request)
    }
}

#[async_trait(?Send)]
impl StorageBackend for HttpStorageBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .build_request(reqwest::Method::GET, path)?
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Failed to fetch {}: {}", path, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::FileNotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::BackendError(format!(
                "Fetching {} failed: {}",
                path,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            StorageError::NetworkError(format!("Failed to read response for {}: {}", path, e))
        })?;
        Ok(bytes.to_vec())
    }

    async fn write_file(&self, path: &str, _content: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::PermissionDenied(format!(
            "HTTP catalog is read-only, cannot write {}",
            path
        )))
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        Err(StorageError::BackendError(format!(
            "Listing {} is not supported over HTTP; use catalog.json",
            dir
        )))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        let response = self
            .build_request(reqwest::Method::HEAD, path)?
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(format!("Failed to check {}: {}", path, e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(StorageError::BackendError(format!(
                "Checking {} failed: {}",
                path, status
            ))),
        }
    }
}
