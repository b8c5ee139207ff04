use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::repo::{self, CommentView};
use crate::auth::{CurrentUser, STAFF};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/comments/:bookId",
            get(list_comments).post(upsert_comment).delete(delete_own),
        )
        .route("/comments/admin/:commentId", delete(delete_any))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
    pub rating: Option<serde_json::Value>,
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
) -> ApiResult<Json<Vec<CommentView>>> {
    Ok(Json(repo::list_for_book(&state.db, book_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn upsert_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let content = payload
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("content is required".into()))?;

    // The rating must be numeric; any other JSON type is rejected.
    let rating = payload
        .rating
        .as_ref()
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ApiError::Validation("rating must be a number".into()))?;

    let (comment, created) =
        repo::upsert(&state.db, current.id, book_id, content, rating).await?;

    info!(user_id = current.id, book_id, created, "comment upserted");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "data": {
                "commentId": comment.id,
                "bookId": comment.book_id,
                "content": comment.content,
                "rating": comment.rating,
            },
            "message": if created { "comment added" } else { "comment updated" },
        })),
    ))
}

#[instrument(skip(state))]
pub async fn delete_own(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    if !repo::delete_own(&state.db, current.id, book_id).await? {
        return Err(ApiError::NotFound("comment not found".into()));
    }
    info!(user_id = current.id, book_id, "comment deleted");
    Ok(Json(json!({ "success": true, "message": "comment deleted" })))
}

#[instrument(skip(state))]
pub async fn delete_any(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(comment_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;
    if !repo::delete_by_id(&state.db, comment_id).await? {
        return Err(ApiError::NotFound("comment not found".into()));
    }
    info!(moderator = current.id, comment_id, "comment removed by moderation");
    Ok(Json(json!({ "success": true, "message": "comment deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating_of(value: serde_json::Value) -> Option<f64> {
        CommentRequest {
            content: Some("fine".into()),
            rating: Some(value),
        }
        .rating
        .as_ref()
        .and_then(|v| v.as_f64())
    }

    #[test]
    fn rating_must_be_numeric() {
        assert_eq!(rating_of(json!(4.5)), Some(4.5));
        assert_eq!(rating_of(json!(3)), Some(3.0));
        assert_eq!(rating_of(json!("4")), None);
        assert_eq!(rating_of(json!(true)), None);
        assert_eq!(rating_of(json!(null)), None);
    }
}
