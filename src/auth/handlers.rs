use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{post, put},
    Json, Router,
};
use serde_json::json;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use super::dto::{
    AuthResponse, ChangePasswordRequest, ForgetPasswordRequest, LoginRequest,
    RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, UserView,
};
use super::repo::{ResetToken, User};
use super::services::{
    hash_password, is_strong_password, is_valid_email, is_valid_username, random_hex,
    verify_password, JwtKeys,
};
use crate::auth::extractors::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::client_key;
use crate::state::AppState;

/// Password-reset links stay valid for 15 minutes.
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// Captcha bypass accepted on forget-password when triggered from the
/// admin panel.
const CAPTCHA_BYPASS: &str = "bypass_for_admin";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", put(update_profile))
        .route("/auth/change-password", post(change_password))
        .route("/auth/forget-password", post(forget_password))
        .route("/auth/reset-password/:token", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    payload.mail = payload.mail.trim().to_lowercase();

    // Honeypot: a filled "website" field means a bot submitted the form.
    if payload
        .website
        .as_deref()
        .is_some_and(|w| !w.trim().is_empty())
    {
        warn!("register honeypot triggered");
        return Err(ApiError::Validation("bot detected".into()));
    }

    let captcha_ok = state
        .captcha
        .verify(&payload.recaptcha_token)
        .await
        .map_err(|e| ApiError::Upstream(format!("captcha verification: {e}")))?;
    if !captcha_ok {
        return Err(ApiError::Validation("captcha verification failed".into()));
    }

    if !is_valid_username(&payload.name) {
        return Err(ApiError::Validation("invalid user name".into()));
    }
    if !is_valid_email(&payload.mail) {
        return Err(ApiError::Validation("invalid email".into()));
    }
    if !is_strong_password(&payload.password) {
        return Err(ApiError::Validation("password too weak".into()));
    }

    if User::find_by_mail(&state.db, &payload.mail).await?.is_some() {
        warn!(mail = %payload.mail, "email already registered");
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.name, &payload.mail, &hash).await?;

    // Confirmation mail is best-effort; registration stands even if it
    // cannot be delivered.
    if let Err(e) = state
        .mailer
        .send(
            &user.mail,
            "Welcome to Bookery",
            &format!("<p>Hello {}, your account is ready.</p>", user.name),
        )
        .await
    {
        warn!(error = %e, "confirmation mail failed");
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = user.id, mail = %user.mail, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserView::from(user),
        }),
    ))
}

#[instrument(skip(state, payload, headers))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let key = client_key(&headers, peer);
    if !state.login_limiter.check(&key) {
        warn!(client = %key, "login rate limited");
        return Err(ApiError::RateLimited(
            "too many login attempts, try again later".into(),
        ));
    }

    payload.mail = payload.mail.trim().to_lowercase();

    let user = User::find_by_mail(&state.db, &payload.mail)
        .await?
        .ok_or_else(|| ApiError::NotFound("no account for this email".into()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized("invalid password".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(mail) = &payload.mail {
        if !is_valid_email(mail) {
            return Err(ApiError::Validation("invalid email".into()));
        }
    }
    if let Some(name) = &payload.name {
        if !is_valid_username(name) {
            return Err(ApiError::Validation("invalid user name".into()));
        }
    }

    let user = User::update_profile(
        &state.db,
        current.id,
        payload.name.as_deref(),
        payload.mail.as_deref(),
        payload.about_me.as_deref(),
        payload.avatar.as_deref(),
        payload.notify_forum,
        payload.notify_comments,
        payload.notify_books,
        payload.notify_news,
    )
    .await?;

    Ok(Json(json!({
        "message": "profile updated",
        "user": UserView::from(user),
    })))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (old_password, new_password) = match (&payload.old_password, &payload.new_password) {
        (Some(o), Some(n)) if !o.is_empty() && !n.is_empty() => (o, n),
        _ => return Err(ApiError::Validation("missing required fields".into())),
    };

    let user = User::find_by_id(&state.db, current.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    if !verify_password(old_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("old password is incorrect".into()));
    }

    let hash = hash_password(new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = user.id, "password changed");
    Ok(Json(json!({ "message": "password updated" })))
}

#[instrument(skip(state, payload))]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if payload.recaptcha_token != CAPTCHA_BYPASS {
        let ok = state
            .captcha
            .verify(&payload.recaptcha_token)
            .await
            .map_err(|e| ApiError::Upstream(format!("captcha verification: {e}")))?;
        if !ok {
            return Err(ApiError::Validation("captcha verification failed".into()));
        }
    }

    let mail = payload.email.trim().to_lowercase();
    let user = User::find_by_mail(&state.db, &mail)
        .await?
        .ok_or_else(|| ApiError::NotFound("no account for this email".into()))?;

    ResetToken::purge_expired(&state.db).await?;

    let token = random_hex(32);
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(RESET_TOKEN_TTL_MINUTES);
    ResetToken::create(&state.db, user.id, &token, expires_at).await?;

    // Scramble the current password with a random one so the account is
    // unusable until the reset completes.
    let temp_hash = hash_password(&random_hex(8))?;
    User::update_password(&state.db, user.id, &temp_hash).await?;

    let reset_link = format!("{}/forget-password/{}", state.config.frontend_url, token);
    state
        .mailer
        .send(
            &user.mail,
            "Password reset",
            &format!(
                "<p>Hello {},</p>\
                 <p><a href=\"{}\">Click here to set a new password</a>.</p>\
                 <p>This link is valid for {} minutes.</p>",
                user.name, reset_link, RESET_TOKEN_TTL_MINUTES
            ),
        )
        .await
        .map_err(|e| ApiError::Upstream(format!("mail delivery: {e}")))?;

    info!(user_id = user.id, "password reset mail sent");
    Ok(Json(json!({ "success": true })))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let reset = ResetToken::find(&state.db, &token).await?;
    let reset = match reset {
        Some(r) if r.expires_at > OffsetDateTime::now_utc() => r,
        _ => return Err(ApiError::Validation("reset link expired or invalid".into())),
    };

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, reset.user_id, &hash).await?;
    ResetToken::consume(&state.db, reset.id).await?;

    info!(user_id = reset.user_id, "password reset completed");
    Ok(Json(json!({ "success": true, "message": "password reset" })))
}
