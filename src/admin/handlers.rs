use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::repo;
use crate::auth::dto::UserView;
use crate::auth::{CurrentUser, Role, UserStatus, ADMIN_ONLY, STAFF};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/users/:id/status", put(update_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
}

fn parse_status(raw: &str) -> Option<UserStatus> {
    match raw {
        "active" => Some(UserStatus::Active),
        "suspended" => Some(UserStatus::Suspended),
        "banned" => Some(UserStatus::Banned),
        _ => None,
    }
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw {
        "user" => Some(Role::User),
        "moderator" => Some(Role::Moderator),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<UserListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;

    let page = params
        .page
        .as_deref()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(1);
    let limit = params
        .limit
        .as_deref()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(10);
    let search = params.search.as_deref().unwrap_or("");
    // "all" (and anything unrecognized) means no status filter.
    let status = params.status.as_deref().and_then(parse_status);

    let (users, total) = repo::list(&state.db, page, limit, search, status).await?;
    let users: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(Json(json!({ "users": users, "total": total })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub name: Option<String>,
    pub mail: Option<String>,
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;

    let role = match payload.role.as_deref() {
        Some(raw) => Some(
            parse_role(raw).ok_or_else(|| ApiError::Validation("invalid role".into()))?,
        ),
        None => None,
    };

    let user = repo::update_user(
        &state.db,
        id,
        role,
        payload.name.as_deref(),
        payload.mail.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    info!(user_id = id, by = current.id, "user updated");
    Ok(Json(json!({ "message": "user updated", "user": UserView::from(user) })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(STAFF)?;

    let status = payload
        .status
        .as_deref()
        .and_then(parse_status)
        .ok_or_else(|| ApiError::Validation("invalid status".into()))?;

    // The heaviest sanction is reserved for admins.
    if status == UserStatus::Banned {
        current.authorize(ADMIN_ONLY)?;
    }

    let user = repo::update_status(&state.db, id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    info!(user_id = id, by = current.id, ?status, "user status updated");
    Ok(Json(json!({ "message": "status updated", "user": UserView::from(user) })))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    current.authorize(ADMIN_ONLY)?;
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("user not found".into()));
    }
    info!(user_id = id, by = current.id, "user deleted");
    Ok(Json(json!({ "message": "user deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_map_to_variants() {
        assert_eq!(parse_status("active"), Some(UserStatus::Active));
        assert_eq!(parse_status("suspended"), Some(UserStatus::Suspended));
        assert_eq!(parse_status("banned"), Some(UserStatus::Banned));
        assert_eq!(parse_status("all"), None);
        assert_eq!(parse_status("Banned"), None);
    }

    #[test]
    fn role_strings_map_to_variants() {
        assert_eq!(parse_role("user"), Some(Role::User));
        assert_eq!(parse_role("moderator"), Some(Role::Moderator));
        assert_eq!(parse_role("admin"), Some(Role::Admin));
        assert_eq!(parse_role("superuser"), None);
    }
}
