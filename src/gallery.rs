use crate::{
    domain::FileStorage,
    errors::{AppError, StorageError},
    models::{parse_image_name, PUBLISHED_PREFIX},
};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{TimeDelta, Utc};
use futures::{future, StreamExt, TryStreamExt};
use std::time::Duration;
use tracing;

pub const STATIC_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const IMAGE_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);
pub const MISSING_MAX_AGE: Duration = Duration::from_secs(10 * 60);
pub const GALLERY_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Most published images shown on the index page.
pub const GALLERY_LIMIT: usize = 500;

/// Writes `Cache-Control` / `Expires`, or nothing at all in dev mode.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub dev_mode: bool,
}

impl CachePolicy {
    /// Replaces any caching headers already present with `max_age`.
    pub fn apply(&self, headers: &mut HeaderMap, max_age: Duration) {
        Self::clear(headers);
        if self.dev_mode {
            return;
        }
        let control = format!("public, max-age={}", max_age.as_secs());
        let expires = (Utc::now() + TimeDelta::from_std(max_age).unwrap_or_default())
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        if let Ok(value) = HeaderValue::from_str(&control) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&expires) {
            headers.insert(header::EXPIRES, value);
        }
    }

    pub fn clear(headers: &mut HeaderMap) {
        headers.remove(header::CACHE_CONTROL);
        headers.remove(header::EXPIRES);
    }

    /// 404 that may be cached briefly, so a transient miss is re-checked soon.
    pub fn not_found(&self) -> Response {
        let mut response = (StatusCode::NOT_FOUND, "404 page not found").into_response();
        self.apply(response.headers_mut(), MISSING_MAX_AGE);
        response
    }
}

/// Streams `{prefix}{name}` to the client.
///
/// Names other than a bare `.jpg`/`.png` are answered with 404 before the
/// store is touched. A missing object is a short-lived cacheable 404; any
/// other storage failure becomes a 500 without cache headers.
pub async fn stream_object(
    storage: &dyn FileStorage,
    cache: CachePolicy,
    prefix: &str,
    name: &str,
) -> Result<Response, AppError> {
    if parse_image_name(name).is_none() {
        tracing::debug!(name, "Refusing to proxy unsupported name");
        return Ok(cache.not_found());
    }
    let key = format!("{}{}", prefix, name);

    let (body, stored_type) = match storage.download(&key).await {
        Ok(object) => object,
        Err(StorageError::NotFound(_)) => {
            tracing::debug!(s3_key = %key, "Image not in store");
            return Ok(cache.not_found());
        }
        Err(e) => return Err(e.into()),
    };

    let content_type = mime_guess::from_path(name)
        .first_raw()
        .map(str::to_string)
        .or(stored_type);

    let mut response = Response::new(Body::from_stream(body));
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    cache.apply(response.headers_mut(), IMAGE_MAX_AGE);
    Ok(response)
}

/// Names of published images, in key order, at most `limit`.
pub async fn list_published(storage: &dyn FileStorage, limit: usize) -> Result<Vec<String>, AppError> {
    let names: Vec<String> = storage
        .list(PUBLISHED_PREFIX)
        .map_ok(|key| key.trim_start_matches(PUBLISHED_PREFIX).to_string())
        .try_filter(|name| future::ready(parse_image_name(name).is_some()))
        .take(limit)
        .try_collect()
        .await?;
    Ok(names)
}
