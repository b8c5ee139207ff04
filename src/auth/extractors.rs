use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::repo::User;
use super::role::Role;
use super::services::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated identity, loaded fresh from the store so forum posts can
/// denormalize the current name/avatar.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub name: String,
    pub avatar: Option<String>,
    pub role: Role,
}

impl CurrentUser {
    /// Role check for privileged routes: the identity's role must be in
    /// the route's accepted set.
    pub fn authorize(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("access denied".into()))
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Moderator | Role::Admin)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("invalid auth scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys
            .verify(token)
            .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))?;

        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown user".into()))?;

        Ok(CurrentUser {
            id: user.id,
            name: user.name,
            avatar: user.avatar,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff_member(role: Role) -> CurrentUser {
        CurrentUser {
            id: 1,
            name: "mod".into(),
            avatar: None,
            role,
        }
    }

    #[test]
    fn authorize_respects_declared_set() {
        use crate::auth::role::{ADMIN_ONLY, STAFF};

        assert!(staff_member(Role::Moderator).authorize(STAFF).is_ok());
        assert!(staff_member(Role::Admin).authorize(STAFF).is_ok());
        let err = staff_member(Role::User).authorize(STAFF).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        // Moderator is not enough where admin is required.
        assert!(staff_member(Role::Moderator).authorize(ADMIN_ONLY).is_err());
    }
}
