//! The moderation queue and the approve / reject actions.
//!
//! Approval is copy-then-delete across three storage calls with no
//! rollback. A failure part way leaves at worst a published image whose
//! pending copy still exists; running the same action again finishes it.

use crate::{
    domain::FileStorage,
    errors::{AppError, StorageError},
    models::{
        parse_image_name, pending_key, published_key, sidecar_key, PendingPhoto, Photo,
        PENDING_PREFIX, SIDECAR_EXTENSION,
    },
};
use bytes::Bytes;
use futures::{future, Stream, StreamExt, TryStreamExt};
use tracing;

/// Most sidecars read per queue view.
pub const QUEUE_LIMIT: usize = 50;

/// Streams up to `limit` pending submissions in key order.
///
/// Sidecars are fetched one at a time as the stream is polled. A sidecar that
/// vanished after listing (approved or rejected meanwhile) is skipped; one
/// that fails to decode ends the stream with `AppError::DecodeError`.
pub fn list_pending<'a>(
    storage: &'a dyn FileStorage,
    limit: usize,
) -> impl Stream<Item = Result<PendingPhoto, AppError>> + Send + 'a {
    storage
        .list(PENDING_PREFIX)
        .try_filter(|key| future::ready(key.ends_with(SIDECAR_EXTENSION)))
        .take(limit)
        .map_err(AppError::from)
        .try_filter_map(move |key| read_sidecar(storage, key))
}

async fn read_sidecar(storage: &dyn FileStorage, key: String) -> Result<Option<PendingPhoto>, AppError> {
    let (body, _) = match storage.download(&key).await {
        Ok(object) => object,
        Err(StorageError::NotFound(_)) => {
            tracing::debug!(%key, "Sidecar disappeared while listing, skipping");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let chunks: Vec<Bytes> = body
        .try_collect()
        .await
        .map_err(|e| StorageError::BackendError(anyhow::Error::new(e).context(format!("Failed to read sidecar '{}'", key))))?;

    match serde_json::from_slice::<Photo>(&chunks.concat()) {
        Ok(photo) => Ok(Some(PendingPhoto { key, photo })),
        Err(source) => {
            tracing::error!(%key, error = %source, "Malformed sidecar in moderation queue");
            Err(AppError::DecodeError { key, source })
        }
    }
}

fn checked_name(image_file: &str) -> Result<&str, AppError> {
    parse_image_name(image_file)
        .map(|(stem, _)| stem)
        .ok_or_else(|| AppError::InvalidInput(format!("not a pending image name: {:?}", image_file)))
}

/// Publishes `uploaded/{image_file}` as `images/{image_file}` and removes the
/// pending image and its sidecar.
///
/// Safe to repeat: when the pending image is already gone but the published
/// one exists, the remaining deletes run and the call succeeds.
pub async fn approve(storage: &dyn FileStorage, image_file: &str) -> Result<(), AppError> {
    let stem = checked_name(image_file)?;
    let pending = pending_key(image_file);
    let published = published_key(image_file);

    match storage.copy(&pending, &published).await {
        Ok(()) => {}
        Err(StorageError::NotFound(key)) => {
            if !storage.exists(&published).await? {
                return Err(AppError::NotFound(key));
            }
            tracing::info!(%published, "Already published, finishing cleanup");
        }
        Err(e) => return Err(e.into()),
    }

    storage.delete(&pending).await?;
    storage.delete(&sidecar_key(stem)).await?;

    tracing::info!(%published, "Approved submission");
    Ok(())
}

/// Discards a pending submission without publishing it.
pub async fn reject(storage: &dyn FileStorage, image_file: &str) -> Result<(), AppError> {
    let stem = checked_name(image_file)?;

    storage.delete(&pending_key(image_file)).await?;
    storage.delete(&sidecar_key(stem)).await?;

    tracing::info!(image_file, "Rejected submission");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        intake::{submit, UploadedImage},
        storage::MemoryFileStorage,
    };

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nbody";

    async fn submit_one(store: &MemoryFileStorage, copyright: &str) -> String {
        let photo = Photo {
            copyright: copyright.into(),
            colors: "green".into(),
            ..Default::default()
        };
        let image = UploadedImage {
            data: Bytes::from_static(PNG),
            content_type: Some("image/png".into()),
            file_name: None,
        };
        let submission = submit(store, photo, Some(image)).await.unwrap();
        submission.image_key.trim_start_matches(PENDING_PREFIX).to_string()
    }

    async fn queue(store: &MemoryFileStorage, limit: usize) -> Result<Vec<PendingPhoto>, AppError> {
        list_pending(store, limit).try_collect().await
    }

    #[tokio::test]
    async fn queue_lists_every_submission_up_to_limit() {
        let store = MemoryFileStorage::new();
        for i in 0..3 {
            submit_one(&store, &format!("owner {}", i)).await;
        }
        let pending = queue(&store, QUEUE_LIMIT).await.unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|p| p.key.ends_with(".json")));
    }

    #[tokio::test]
    async fn queue_truncates_at_limit() {
        let store = MemoryFileStorage::new();
        for i in 0..(QUEUE_LIMIT + 2) {
            submit_one(&store, &format!("owner {}", i)).await;
        }
        assert_eq!(queue(&store, QUEUE_LIMIT).await.unwrap().len(), QUEUE_LIMIT);
    }

    #[tokio::test]
    async fn queue_of_exactly_limit_is_complete() {
        let store = MemoryFileStorage::new();
        for i in 0..QUEUE_LIMIT {
            submit_one(&store, &format!("owner {}", i)).await;
        }
        assert_eq!(queue(&store, QUEUE_LIMIT).await.unwrap().len(), QUEUE_LIMIT);
    }

    #[tokio::test]
    async fn corrupt_sidecar_fails_whole_listing() {
        let store = MemoryFileStorage::new();
        submit_one(&store, "Jane Doe").await;
        store
            .upload("uploaded/0-broken.json", Bytes::from_static(b"{not json"), None)
            .await
            .unwrap();

        let err = queue(&store, QUEUE_LIMIT).await.unwrap_err();
        assert!(matches!(err, AppError::DecodeError { ref key, .. } if key == "uploaded/0-broken.json"));
    }

    #[tokio::test]
    async fn approve_moves_image_and_drops_sidecar() {
        let store = MemoryFileStorage::new();
        let name = submit_one(&store, "Jane Doe").await;

        approve(&store, &name).await.unwrap();

        assert_eq!(store.keys().await, vec![format!("images/{}", name)]);
        assert_eq!(store.get(&format!("images/{}", name)).await.unwrap().as_ref(), PNG);
    }

    #[tokio::test]
    async fn approve_twice_is_harmless() {
        let store = MemoryFileStorage::new();
        let name = submit_one(&store, "Jane Doe").await;

        approve(&store, &name).await.unwrap();
        approve(&store, &name).await.unwrap();

        assert_eq!(store.keys().await, vec![format!("images/{}", name)]);
    }

    #[tokio::test]
    async fn approve_finishes_after_partial_failure() {
        let store = MemoryFileStorage::new();
        let name = submit_one(&store, "Jane Doe").await;
        // Simulate a crash after the copy: published and pending both exist.
        store
            .copy(&format!("uploaded/{}", name), &format!("images/{}", name))
            .await
            .unwrap();

        approve(&store, &name).await.unwrap();
        assert_eq!(store.keys().await, vec![format!("images/{}", name)]);
    }

    #[tokio::test]
    async fn approve_unknown_image_is_not_found() {
        let store = MemoryFileStorage::new();
        let err = approve(&store, "missing.jpg").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn approve_rejects_path_tricks() {
        let store = MemoryFileStorage::new();
        store
            .upload("secret.jpg", Bytes::from_static(b"x"), None)
            .await
            .unwrap();
        for name in ["../secret.jpg", "../../etc/passwd.jpg", "x.json", ""] {
            let err = approve(&store, name).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{name}");
        }
        assert_eq!(store.keys().await, vec!["secret.jpg".to_string()]);
    }

    #[tokio::test]
    async fn reject_removes_submission_without_publishing() {
        let store = MemoryFileStorage::new();
        let keep = submit_one(&store, "Keep").await;
        let drop = submit_one(&store, "Drop").await;

        reject(&store, &drop).await.unwrap();

        let pending = queue(&store, QUEUE_LIMIT).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].photo.copyright, "Keep");
        assert_eq!(pending[0].photo.image_reference, keep);
        assert!(store.keys().await.iter().all(|k| !k.starts_with("images/")));
    }

    #[tokio::test]
    async fn approve_while_listing_leaves_consistent_store() {
        let store = MemoryFileStorage::new();
        let mut names = Vec::new();
        for i in 0..10 {
            names.push(submit_one(&store, &format!("owner {}", i)).await);
        }

        let approvals = async {
            for name in &names[..5] {
                approve(&store, name).await.unwrap();
            }
        };
        let listing = async {
            for _ in 0..5 {
                let pending = queue(&store, QUEUE_LIMIT).await.unwrap();
                assert!(pending.len() >= 5 && pending.len() <= 10);
                tokio::task::yield_now().await;
            }
        };
        tokio::join!(approvals, listing);

        let keys = store.keys().await;
        for name in &names[..5] {
            assert!(keys.contains(&format!("images/{}", name)));
            assert!(!keys.contains(&format!("uploaded/{}", name)));
        }
        for name in &names[5..] {
            assert!(keys.contains(&format!("uploaded/{}", name)));
        }
        assert_eq!(queue(&store, QUEUE_LIMIT).await.unwrap().len(), 5);
    }
}
