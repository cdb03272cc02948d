use crate::{
    errors::AppError,
    gallery::{self, GALLERY_LIMIT, GALLERY_MAX_AGE, STATIC_MAX_AGE},
    intake,
    models::{PENDING_PREFIX, PUBLISHED_PREFIX},
    moderation::{self, QUEUE_LIMIT},
    pages::{ROBOTS_TXT, STYLE_CSS},
    AppState,
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing;

/// Handler for GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let names = gallery::list_published(state.file_storage.as_ref(), GALLERY_LIMIT).await?;
    tracing::debug!("Rendering gallery with {} images", names.len());

    let mut response = Html(state.templates.index(&names).await?).into_response();
    state.cache.apply(response.headers_mut(), GALLERY_MAX_AGE);
    Ok(response)
}

/// Handler for GET /robots.txt
pub async fn robots_txt(State(state): State<Arc<AppState>>) -> Response {
    let mut response = ([(header::CONTENT_TYPE, "text/plain")], ROBOTS_TXT).into_response();
    state.cache.apply(response.headers_mut(), STATIC_MAX_AGE);
    response
}

/// Handler for GET /static/{*path} when assets are embedded.
pub async fn static_asset(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Response {
    match path.as_str() {
        "style.css" => {
            let mut response = ([(header::CONTENT_TYPE, "text/css")], STYLE_CSS).into_response();
            state.cache.apply(response.headers_mut(), STATIC_MAX_AGE);
            response
        }
        _ => state.cache.not_found(),
    }
}

/// Handler for GET /images/{name}
pub async fn image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    gallery::stream_object(state.file_storage.as_ref(), state.cache, PUBLISHED_PREFIX, &name).await
}

/// Handler for GET /upload
pub async fn upload_form(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    Ok(Html(state.templates.upload().await?))
}

/// Handler for POST /upload
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (photo, image) = intake::read_form(&mut multipart).await?;
    let submission = intake::submit(state.file_storage.as_ref(), photo, image).await?;

    tracing::info!(id = %submission.id, "Photo submitted via handler");
    Ok(([(header::CONTENT_TYPE, "text/plain")], intake::THANK_YOU))
}

/// Handler for GET /_admin/
pub async fn admin(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let pending: Vec<_> = moderation::list_pending(state.file_storage.as_ref(), QUEUE_LIMIT)
        .try_collect()
        .await?;
    tracing::debug!("Moderation queue holds {} submissions", pending.len());

    Ok(Html(state.templates.admin(&pending, QUEUE_LIMIT).await?))
}

#[derive(Debug, Deserialize)]
pub struct ModerationForm {
    #[serde(default)]
    pub image_file: String,
    #[serde(default)]
    pub action: Option<String>,
}

/// Handler for POST /_admin/
pub async fn moderate(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ModerationForm>,
) -> Result<Response, AppError> {
    let storage = state.file_storage.as_ref();
    match form.action.as_deref().unwrap_or("approve") {
        "approve" => moderation::approve(storage, &form.image_file).await?,
        "reject" => moderation::reject(storage, &form.image_file).await?,
        other => return Err(AppError::InvalidInput(format!("unknown action {:?}", other))),
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, "/_admin/")]).into_response())
}

/// Handler for GET /_admin/images/{name}
pub async fn pending_image(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    gallery::stream_object(state.file_storage.as_ref(), state.cache, PENDING_PREFIX, &name).await
}
