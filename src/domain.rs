use crate::errors::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Object body as it comes out of the store, chunk by chunk.
pub type ObjectStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Lazily paginated object keys under a prefix.
pub type KeyStream = BoxStream<'static, Result<String, StorageError>>;

/// Operations on named objects within the single photo bucket.
///
/// Implementations must be safe to share between concurrent requests; the
/// store is the only state the application keeps.
#[async_trait]
pub trait FileStorage: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    /// Uploads file data to the storage backend.
    async fn upload(&self, key: &str, data: Bytes, content_type: Option<String>) -> Result<(), StorageError>;

    /// Opens an object for reading. `StorageError::NotFound` when the key does not exist.
    async fn download(&self, key: &str) -> Result<(ObjectStream, Option<String>), StorageError>;

    /// Deletes an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Server-side copy within the bucket. `StorageError::NotFound` when `src` is missing.
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError>;

    /// Reports whether an object exists without reading it.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Streams every key under `prefix` in lexicographic order.
    fn list(&self, prefix: &str) -> KeyStream;
}
