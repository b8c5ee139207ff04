use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::dto::{AddToCollectionRequest, CollectionEntryView, CollectionQueryParams, ProgressRequest};
use super::repo::{self, AddOutcome};
use crate::auth::CurrentUser;
use crate::books::query::BookFilters;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/collection", get(list_collection))
        .route("/collection/add", post(add_to_collection))
        .route(
            "/collection/:bookId",
            delete(remove_from_collection).patch(update_read_state),
        )
        .route(
            "/collection/progress/:bookId",
            get(get_progress).post(save_progress),
        )
}

#[derive(Debug, Deserialize)]
pub struct ReadStateRequest {
    pub is_read: Option<serde_json::Value>,
}

/// The noted/commented switches cannot be pushed into SQL alongside the
/// shared predicate without duplicating the aggregate subqueries, so they
/// run over the fetched rows.
fn apply_switches(
    entries: Vec<CollectionEntryView>,
    noted_only: bool,
    commented_only: bool,
) -> Vec<CollectionEntryView> {
    entries
        .into_iter()
        .filter(|e| !noted_only || e.average_rating > 0.0)
        .filter(|e| !commented_only || e.comment_count > 0)
        .collect()
}

#[instrument(skip(state))]
pub async fn list_collection(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<CollectionQueryParams>,
) -> ApiResult<Json<Vec<CollectionEntryView>>> {
    let filters = BookFilters::from_params(&params.book_params());
    let entries = repo::list(&state.db, current.id, &filters, params.read_only()).await?;
    let entries = apply_switches(entries, params.noted_only(), params.commented_only());
    Ok(Json(entries))
}

#[instrument(skip(state, payload))]
pub async fn add_to_collection(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<AddToCollectionRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let book_id = payload
        .book_id
        .ok_or_else(|| ApiError::Validation("bookId is required".into()))?;

    match repo::add(&state.db, current.id, book_id).await? {
        AddOutcome::BookMissing => Err(ApiError::NotFound("book not found".into())),
        AddOutcome::AlreadyPresent => {
            Err(ApiError::Conflict("book already in collection".into()))
        }
        AddOutcome::Added => {
            info!(user_id = current.id, book_id, "book added to collection");
            Ok((
                StatusCode::CREATED,
                Json(json!({ "success": true, "message": "book added to collection" })),
            ))
        }
    }
}

#[instrument(skip(state))]
pub async fn remove_from_collection(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    if !repo::remove(&state.db, current.id, book_id).await? {
        return Err(ApiError::NotFound("book not in collection".into()));
    }
    info!(user_id = current.id, book_id, "book removed from collection");
    Ok(Json(json!({ "success": true, "message": "book removed from collection" })))
}

#[instrument(skip(state, payload))]
pub async fn update_read_state(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
    Json(payload): Json<ReadStateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    // Only a JSON boolean is accepted; "true" the string is a client bug.
    let is_read = payload
        .is_read
        .as_ref()
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ApiError::Validation("isRead must be a boolean".into()))?;

    if !repo::set_read(&state.db, current.id, book_id, is_read).await? {
        return Err(ApiError::NotFound("book not in collection".into()));
    }
    info!(user_id = current.id, book_id, is_read, "read state updated");
    Ok(Json(json!({ "success": true, "isRead": is_read })))
}

#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    // Null both when nothing is stored and when the book is not in the
    // collection at all; only recording a position requires an entry.
    let cfi = repo::get_cfi(&state.db, current.id, book_id).await?.flatten();
    Ok(Json(json!({ "cfi": cfi })))
}

#[instrument(skip(state, payload))]
pub async fn save_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(book_id): Path<i32>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let cfi = payload
        .cfi
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("cfi is required".into()))?;

    if !repo::set_cfi(&state.db, current.id, book_id, cfi).await? {
        return Err(ApiError::NotFound("book not in collection".into()));
    }
    Ok(Json(json!({ "success": true, "cfi": cfi })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::repo::BookStatus;
    use time::macros::{date, datetime};

    fn entry(book_id: i32, rating: f64, comments: i64) -> CollectionEntryView {
        CollectionEntryView {
            book_id,
            is_read: false,
            last_cfi: None,
            added_at: datetime!(2024-06-01 12:00 UTC),
            title: format!("book {book_id}"),
            author: "author".into(),
            date: date!(2020 - 01 - 01),
            summary: None,
            cover_url: None,
            status: BookStatus::Validated,
            average_rating: rating,
            comment_count: comments,
        }
    }

    #[test]
    fn switches_off_keep_everything() {
        let out = apply_switches(vec![entry(1, 0.0, 0), entry(2, 4.5, 3)], false, false);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn noted_keeps_only_rated_books() {
        let out = apply_switches(vec![entry(1, 0.0, 2), entry(2, 4.5, 0)], true, false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].book_id, 2);
    }

    #[test]
    fn commented_keeps_only_discussed_books() {
        let out = apply_switches(vec![entry(1, 0.0, 2), entry(2, 4.5, 0)], false, true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].book_id, 1);
    }

    #[test]
    fn both_switches_intersect() {
        let out = apply_switches(
            vec![entry(1, 4.0, 2), entry(2, 4.5, 0), entry(3, 0.0, 5)],
            true,
            true,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].book_id, 1);
    }
}
