use crate::{
    domain::{FileStorage, KeyStream, ObjectStream},
    errors::StorageError,
};
use anyhow::Context;
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    Client as S3Client,
    error::SdkError,
};
use bytes::Bytes;
use futures::StreamExt;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing;

#[derive(Debug, Clone)]
pub struct S3FileStorage {
    client: S3Client,
    bucket_name: String,
}

impl S3FileStorage {
    pub fn new(client: S3Client, bucket_name: String) -> Self {
        Self { client, bucket_name }
    }
}

#[async_trait]
impl FileStorage for S3FileStorage {
    /// Uploads data to S3 using PutObject. Sets Content-Type.
    async fn upload(&self, key: &str, data: Bytes, content_type: Option<String>) -> Result<(), StorageError> {
        let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, size = data.len(), "S3: Uploading file");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .context(format!("S3: Failed to upload object with key '{}'", key))
            .map_err(|e| StorageError::UploadFailed(format!("{:#}", e)))?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(())
    }

    /// Opens the object with GetObject and hands back its body as a stream.
    async fn download(&self, key: &str) -> Result<(ObjectStream, Option<String>), StorageError> {
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Downloading file");

        let output = self.client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|sdk_err| {
                if let SdkError::ServiceError(service_err) = &sdk_err {
                    if service_err.err().is_no_such_key() {
                        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: NoSuchKey");
                        return StorageError::NotFound(key.to_string());
                    }
                }
                tracing::error!(s3_key = %key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error downloading file");
                StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to download object with key '{}'", key)))
            })?;

        let content_type = output.content_type().map(|s| s.to_string());
        let body = ReaderStream::new(output.body.into_async_read()).boxed();
        Ok((body, content_type))
    }

    /// Deletes an object from S3 using DeleteObject.
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Deleting object");

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|sdk_err| {
                // DeleteObject succeeds even if the object doesn't exist.
                tracing::error!(s3_key = %key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error deleting object");
                StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to delete object with key '{}'", key)))
            })?;

        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, "S3: Delete request successful (object might not have existed)");
        Ok(())
    }

    /// Copies `src` to `dst` with CopyObject; the bytes never leave S3.
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        tracing::debug!(src, dst, bucket = %self.bucket_name, "S3: Copying object");

        self.client
            .copy_object()
            .bucket(&self.bucket_name)
            .copy_source(format!("{}/{}", self.bucket_name, src))
            .key(dst)
            .send()
            .await
            .map_err(|sdk_err| {
                if let SdkError::ServiceError(service_err) = &sdk_err {
                    if service_err.err().meta().code() == Some("NoSuchKey") {
                        tracing::debug!(src, bucket = %self.bucket_name, "S3: Copy source missing");
                        return StorageError::NotFound(src.to_string());
                    }
                }
                tracing::error!(src, dst, bucket = %self.bucket_name, error = %sdk_err, "S3: Error copying object");
                StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to copy '{}' to '{}'", src, dst)))
            })?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => Ok(false),
            Err(sdk_err) => {
                tracing::error!(s3_key = %key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error checking object");
                Err(StorageError::BackendError(anyhow::Error::new(sdk_err).context(format!("S3: Failed to head object with key '{}'", key))))
            }
        }
    }

    /// Walks ListObjectsV2 pages on demand; nothing is fetched until polled.
    fn list(&self, prefix: &str) -> KeyStream {
        let client = self.client.clone();
        let bucket_name = self.bucket_name.clone();
        let prefix = prefix.to_string();

        let listing = stream! {
            let mut pages = client
                .list_objects_v2()
                .bucket(&bucket_name)
                .prefix(&prefix)
                .into_paginator()
                .send();

            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(sdk_err) => {
                        tracing::error!(%prefix, bucket = %bucket_name, error = %sdk_err, "S3: Error listing objects");
                        yield Err(StorageError::BackendError(
                            anyhow::Error::new(sdk_err).context(format!("S3: Failed to list prefix '{}'", prefix)),
                        ));
                        return;
                    }
                };
                for object in page.contents() {
                    if let Some(key) = object.key() {
                        yield Ok::<String, StorageError>(key.to_string());
                    }
                }
            }
        };
        listing.boxed()
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// Process-local store with the same semantics as the bucket.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    #[cfg(test)]
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn upload(&self, key: &str, data: Bytes, content_type: Option<String>) -> Result<(), StorageError> {
        tracing::debug!(key, size = data.len(), "Memory: Storing object");
        self.objects
            .write()
            .await
            .insert(key.to_string(), StoredObject { data, content_type });
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(ObjectStream, Option<String>), StorageError> {
        let StoredObject { data, content_type } = self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let body = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(data) }).boxed();
        Ok((body, content_type))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(src.to_string()))?;
        objects.insert(dst.to_string(), object);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    fn list(&self, prefix: &str) -> KeyStream {
        let objects = self.objects.clone();
        let prefix = prefix.to_string();

        let listing = stream! {
            let keys: Vec<String> = objects
                .read()
                .await
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                yield Ok::<String, StorageError>(key);
            }
        };
        listing.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn read_all(store: &MemoryFileStorage, key: &str) -> Vec<u8> {
        let (body, _) = store.download(key).await.unwrap();
        let chunks: Vec<Bytes> = body.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryFileStorage::new();
        let err = store.download("images/nope.jpg").await.err().unwrap();
        assert!(matches!(err, StorageError::NotFound(ref k) if k == "images/nope.jpg"));
        assert!(!store.exists("images/nope.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn copy_keeps_source_and_content_type() {
        let store = MemoryFileStorage::new();
        store
            .upload("uploaded/a.png", Bytes::from_static(b"png"), Some("image/png".into()))
            .await
            .unwrap();
        store.copy("uploaded/a.png", "images/a.png").await.unwrap();

        assert_eq!(read_all(&store, "images/a.png").await, b"png");
        let (_, content_type) = store.download("images/a.png").await.unwrap();
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert!(store.exists("uploaded/a.png").await.unwrap());
    }

    #[tokio::test]
    async fn copy_of_missing_source_is_not_found() {
        let store = MemoryFileStorage::new();
        let err = store.copy("uploaded/a.png", "images/a.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_ok() {
        let store = MemoryFileStorage::new();
        store.delete("uploaded/gone.json").await.unwrap();
    }

    #[tokio::test]
    async fn list_only_returns_prefix_in_order() {
        let store = MemoryFileStorage::new();
        for key in ["uploaded/b.json", "images/a.jpg", "uploaded/a.json", "uploadedX"] {
            store.upload(key, Bytes::new(), None).await.unwrap();
        }
        let keys: Vec<String> = store.list("uploaded/").try_collect().await.unwrap();
        assert_eq!(keys, vec!["uploaded/a.json", "uploaded/b.json"]);
    }
}
