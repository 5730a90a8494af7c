//! Storage backend abstraction
//!
//! Defines the StorageBackend trait used by the catalog to fetch indexes,
//! sidecars and data files, with implementations for:
//! - FileSystemStorageBackend: a local catalog directory
//! - HttpStorageBackend: a catalog served over HTTP (read-only)

use async_trait::async_trait;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Trait for storage backends
///
/// Paths are `/`-separated and relative to the backend's root.
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Read a file from storage
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a file to storage
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;

    /// List file names in a directory
    async fn list_files(&self, dir: &str) -> Result<Vec<String>, StorageError>;

    /// Check if a file exists
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError>;
}

// Storage backend implementations
#[cfg(feature = "native-fs")]
pub mod filesystem;

#[cfg(feature = "api-backend")]
pub mod http;
