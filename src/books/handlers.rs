use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use tracing::{info, instrument};

use super::dto::{
    BookListResponse, BookQueryParams, BookView, CreateBookRequest, UpdateBookRequest,
};
use super::query::BookFilters;
use super::repo::{self, BookRow};
use super::services::{sanitize_key, search_title, top_rated};
use crate::auth::{CurrentUser, ADMIN_ONLY, STAFF};
use crate::comments;
use crate::error::{ApiError, ApiResult};
use crate::images;
use crate::state::AppState;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Cover shown when a book has none of its own.
const DEFAULT_COVER_KEY: &str = "covers/default.webp";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/bestrating", get(best_rated))
        .route("/books/lastadded", get(last_added))
        .route("/books/minyear", get(min_year))
        .route("/books/title/:title", get(book_by_title))
        .route("/books/:id", put(update_book))
        .route(
            "/books/:id/cover",
            put(update_cover).layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .route("/categories", get(list_categories))
        .route("/publishers", get(list_publishers))
}

fn to_view(
    row: BookRow,
    labels: &HashMap<i32, (Vec<String>, Vec<String>)>,
    default_cover: &str,
) -> BookView {
    let (categories, editors) = labels.get(&row.id).cloned().unwrap_or_default();
    BookView {
        book_id: row.id,
        title: row.title,
        author: row.author,
        date: row.publication_date,
        summary: row.summary,
        status: row.status,
        categories,
        editors,
        cover_url: row.cover_url.unwrap_or_else(|| default_cover.to_string()),
        average_rating: row.average_rating,
    }
}

fn single(views: Vec<BookView>) -> ApiResult<BookView> {
    views
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("shaped row vanished")))
}

async fn shape(state: &AppState, rows: Vec<BookRow>) -> ApiResult<Vec<BookView>> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let labels = repo::labels(&state.db, &ids).await?;
    let default_cover = state.storage.public_url(DEFAULT_COVER_KEY);
    Ok(rows
        .into_iter()
        .map(|r| to_view(r, &labels, &default_cover))
        .collect())
}

#[instrument(skip(state))]
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<BookQueryParams>,
) -> ApiResult<Json<BookListResponse>> {
    let filters = BookFilters::from_params(&params);
    let (rows, total) = repo::list(&state.db, &filters).await?;
    let books = shape(&state, rows).await?;
    Ok(Json(BookListResponse { books, total }))
}

#[instrument(skip(state))]
pub async fn best_rated(
    State(state): State<AppState>,
    Query(params): Query<BookQueryParams>,
) -> ApiResult<Json<Vec<BookView>>> {
    // Same predicate minus the text-search clause; sorting happens after
    // retrieval so ties keep store order.
    let filters = BookFilters::from_params(&params).without_search();
    let rows = repo::list_unpaged(&state.db, &filters).await?;
    let views = shape(&state, rows).await?;
    Ok(Json(top_rated(views)))
}

#[instrument(skip(state))]
pub async fn last_added(
    State(state): State<AppState>,
    Query(params): Query<BookQueryParams>,
) -> ApiResult<Json<Vec<BookView>>> {
    let filters = BookFilters::from_params(&params);
    let rows = repo::last_added(&state.db, &filters).await?;
    Ok(Json(shape(&state, rows).await?))
}

#[instrument(skip(state))]
pub async fn min_year(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    match repo::min_year(&state.db).await? {
        Some(year) => Ok(Json(serde_json::json!({ "minYear": year }))),
        None => Err(ApiError::NotFound("no books in catalog".into())),
    }
}

#[instrument(skip(state))]
pub async fn book_by_title(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let row = repo::find_by_title(&state.db, &title)
        .await?
        .ok_or_else(|| ApiError::NotFound("book not found".into()))?;

    let book_id = row.id;
    let view = single(shape(&state, vec![row]).await?)?;

    let comments = comments::repo::list_for_book(&state.db, book_id).await?;

    let mut body = serde_json::to_value(view).map_err(anyhow::Error::from)?;
    body["comments"] = serde_json::to_value(comments).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}

#[instrument(skip(state, payload))]
pub async fn create_book(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreateBookRequest>,
) -> ApiResult<(StatusCode, Json<BookView>)> {
    let title = payload
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("title is required".into()))?;
    let author = payload
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("author is required".into()))?;
    let year = payload
        .year
        .as_deref()
        .ok_or_else(|| ApiError::Validation("publication date is required".into()))?;
    if payload.categories.is_empty() {
        return Err(ApiError::Validation("at least one category is required".into()));
    }
    if payload.editor.is_empty() {
        return Err(ApiError::Validation("at least one publisher is required".into()));
    }
    let publication_date = Date::parse(year, DATE_FORMAT)
        .map_err(|_| ApiError::Validation("invalid publication date".into()))?;

    let derived = search_title(title, author);
    let row = repo::create(
        &state.db,
        repo::NewBook {
            title,
            search_title: &derived,
            author,
            publication_date,
            summary: payload.summary.as_deref(),
            cover_url: payload.cover_url.as_deref(),
        },
        &payload.categories,
        &payload.editor,
    )
    .await?;

    info!(book_id = row.id, user_id = current.id, "book submitted");
    let view = single(shape(&state, vec![row]).await?)?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, payload))]
pub async fn update_book(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBookRequest>,
) -> ApiResult<Json<BookView>> {
    current.authorize(STAFF)?;

    let publication_date = Date::parse(&payload.year, DATE_FORMAT)
        .map_err(|_| ApiError::Validation("invalid publication date".into()))?;

    let derived = search_title(&payload.title, &payload.author);
    let row = repo::update(
        &state.db,
        id,
        repo::BookUpdate {
            title: &payload.title,
            search_title: &derived,
            author: &payload.author,
            publication_date,
            summary: payload.summary.as_deref(),
            cover_url: payload.cover_url.as_deref(),
            status: payload.status,
            validated_by: current.id,
        },
        &payload.categories,
        &payload.editor,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("book not found".into()))?;

    info!(book_id = id, validator = current.id, "book updated");
    Ok(Json(single(shape(&state, vec![row]).await?)?))
}

#[instrument(skip(state, multipart))]
pub async fn update_cover(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(ADMIN_ONLY)?;

    let book = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("book not found".into()))?;

    let mut file = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            file = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable upload: {e}")))?,
            );
        }
    }
    let file = file.ok_or_else(|| ApiError::Validation("file is required".into()))?;

    let cover = images::normalize_cover(&file)
        .map_err(|e| ApiError::Validation(format!("invalid image: {e}")))?;

    let key = format!("covers/{}.webp", sanitize_key(&book.title));
    state
        .storage
        .put_object(&key, cover, images::COVER_CONTENT_TYPE)
        .await
        .map_err(|e| ApiError::Upstream(format!("cover upload: {e}")))?;

    let url = state.storage.public_url(&key);
    repo::set_cover(&state.db, id, &url).await?;

    info!(book_id = id, %key, "cover replaced");
    Ok(Json(serde_json::json!({ "cover_url": url })))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<super::dto::LookupView>>> {
    Ok(Json(repo::categories(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn list_publishers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<super::dto::LookupView>>> {
    Ok(Json(repo::publishers(&state.db).await?))
}
