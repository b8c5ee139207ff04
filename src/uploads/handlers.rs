use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::{repo::User, CurrentUser};
use crate::books::repo as books_repo;
use crate::books::services::sanitize_key;
use crate::error::{ApiError, ApiResult};
use crate::images;
use crate::state::AppState;

const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload/update-avatar", put(update_avatar))
        .route("/upload/cover", post(upload_cover))
        .route("/upload/ebook", put(upload_ebook))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

/// Collected multipart parts: the file plus any text fields we care about.
struct UploadParts {
    file: Option<Bytes>,
    title: Option<String>,
    book_id: Option<i32>,
}

async fn read_parts(multipart: &mut Multipart) -> ApiResult<UploadParts> {
    let mut parts = UploadParts {
        file: None,
        title: None,
        book_id: None,
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                parts.file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::Validation(format!("unreadable upload: {e}")))?,
                );
            }
            Some("title") => {
                parts.title = field.text().await.ok();
            }
            Some("bookId") => {
                parts.book_id = field.text().await.ok().and_then(|v| v.parse().ok());
            }
            _ => {}
        }
    }
    Ok(parts)
}

#[instrument(skip(state, multipart))]
pub async fn update_avatar(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let parts = read_parts(&mut multipart).await?;
    let file = parts
        .file
        .ok_or_else(|| ApiError::Validation("file is required".into()))?;

    let avatar = images::normalize_cover(&file)
        .map_err(|e| ApiError::Validation(format!("invalid image: {e}")))?;

    let key = format!(
        "avatars/{}-{}-avatar.webp",
        current.id,
        sanitize_key(&current.name)
    );

    // Previous avatar goes away first when it lives in our bucket; a
    // failure here only leaves a stray object behind.
    if let Some(old_key) = current
        .avatar
        .as_deref()
        .and_then(|url| state.storage.key_of(url))
    {
        if old_key != key {
            if let Err(e) = state.storage.delete_object(&old_key).await {
                warn!(%old_key, error = %e, "stale avatar not deleted");
            }
        }
    }

    state
        .storage
        .put_object(&key, avatar, images::COVER_CONTENT_TYPE)
        .await
        .map_err(|e| ApiError::Upstream(format!("avatar upload: {e}")))?;

    let url = state.storage.public_url(&key);
    User::update_avatar(&state.db, current.id, &url).await?;

    info!(user_id = current.id, %key, "avatar replaced");
    Ok(Json(json!({ "imageUrl": url })))
}

#[instrument(skip(state, multipart))]
pub async fn upload_cover(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let parts = read_parts(&mut multipart).await?;
    let file = parts
        .file
        .ok_or_else(|| ApiError::Validation("file and title are required".into()))?;
    let title = parts
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("file and title are required".into()))?;

    let cover = images::normalize_cover(&file)
        .map_err(|e| ApiError::Validation(format!("invalid image: {e}")))?;

    let key = format!("covers/{}.webp", sanitize_key(title));
    state
        .storage
        .put_object(&key, cover, images::COVER_CONTENT_TYPE)
        .await
        .map_err(|e| ApiError::Upstream(format!("cover upload: {e}")))?;

    let url = state.storage.public_url(&key);
    info!(user_id = current.id, %key, "cover uploaded");
    Ok(Json(json!({ "imageUrl": url })))
}

#[instrument(skip(state, multipart))]
pub async fn upload_ebook(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let parts = read_parts(&mut multipart).await?;
    let file = parts
        .file
        .ok_or_else(|| ApiError::Validation("file and bookId are required".into()))?;
    let book_id = parts
        .book_id
        .ok_or_else(|| ApiError::Validation("file and bookId are required".into()))?;

    let book = books_repo::find_by_id(&state.db, book_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("book not found".into()))?;

    let key = format!("ebooks/{}.epub", sanitize_key(&book.title));
    state
        .storage
        .put_object(&key, file, "application/epub+zip")
        .await
        .map_err(|e| ApiError::Upstream(format!("ebook upload: {e}")))?;

    let url = state.storage.public_url(&key);
    books_repo::set_ebook(&state.db, book_id, &url).await?;

    info!(user_id = current.id, book_id, %key, "ebook stored");
    Ok(Json(json!({ "ebookUrl": url })))
}
