use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::repo::{Post, Topic};
use crate::auth::{CurrentUser, STAFF};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", get(list_topics).post(create_topic))
        .route("/topics/:id", get(topic_by_id).delete(delete_topic))
        .route("/topics/:id/pin", patch(toggle_pin))
        .route("/topics/:id/lock", patch(toggle_lock))
        .route("/posts", get(list_posts))
        .route("/posts/add", post(create_post))
        .route("/posts/:topicId", get(posts_by_topic))
        .route("/posts/:id", delete(delete_post))
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub topic_id: Option<i32>,
    pub content: Option<String>,
}

#[instrument(skip(state))]
pub async fn list_topics(State(state): State<AppState>) -> ApiResult<Json<Vec<Topic>>> {
    Ok(Json(Topic::list(&state.db).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_topic(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreateTopicRequest>,
) -> ApiResult<(StatusCode, Json<Topic>)> {
    let title = payload
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("title and content are required".into()))?;
    let content = payload
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("title and content are required".into()))?;

    // A pin request from a regular user is dropped, not rejected.
    let pinned = payload.pinned && current.is_staff();

    let topic = Topic::create(
        &state.db,
        title,
        content,
        current.id,
        &current.name,
        current.avatar.as_deref(),
        pinned,
    )
    .await?;
    info!(topic_id = topic.id, author_id = current.id, "topic created");
    Ok((StatusCode::CREATED, Json(topic)))
}

#[instrument(skip(state))]
pub async fn topic_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Topic>> {
    let topic = Topic::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))?;
    Ok(Json(topic))
}

#[instrument(skip(state))]
pub async fn toggle_pin(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;
    let pinned = Topic::toggle_pin(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))?;
    info!(topic_id = id, pinned, "topic pin toggled");
    Ok(Json(json!({ "pinned": pinned })))
}

#[instrument(skip(state))]
pub async fn toggle_lock(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;
    let locked = Topic::toggle_lock(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))?;
    info!(topic_id = id, locked, "topic lock toggled");
    Ok(Json(json!({ "locked": locked })))
}

#[instrument(skip(state))]
pub async fn delete_topic(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;
    if !Topic::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("topic not found".into()));
    }
    info!(topic_id = id, "topic and posts deleted");
    Ok(Json(json!({ "success": true, "message": "topic deleted" })))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(Post::list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn posts_by_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<i32>,
) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(Post::list_for_topic(&state.db, topic_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let topic_id = payload
        .topic_id
        .ok_or_else(|| ApiError::Validation("topicId and content are required".into()))?;
    let content = payload
        .content
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("topicId and content are required".into()))?;

    let topic = Topic::find_by_id(&state.db, topic_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))?;
    if topic.locked {
        return Err(ApiError::Forbidden("topic is locked".into()));
    }

    let post = Post::create(
        &state.db,
        topic_id,
        current.id,
        &current.name,
        current.avatar.as_deref(),
        content,
    )
    .await?;
    info!(post_id = post.id, topic_id, author_id = current.id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;
    if !Post::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("post not found".into()));
    }
    info!(post_id = id, "post deleted");
    Ok(Json(json!({ "success": true, "message": "post deleted" })))
}
