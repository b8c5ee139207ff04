use serde::{Deserialize, Serialize};

use super::repo::User;
use super::role::Role;

/// Request body for user registration. `website` is a honeypot field: bots
/// fill it, humans never see it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub mail: String,
    pub password: String,
    pub recaptcha_token: String,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub mail: String,
    pub password: String,
}

/// Profile fields a user may change on their own account; absent fields
/// keep their stored value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub mail: Option<String>,
    pub about_me: Option<String>,
    pub avatar: Option<String>,
    pub notify_forum: Option<bool>,
    pub notify_comments: Option<bool>,
    pub notify_books: Option<bool>,
    pub notify_news: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgetPasswordRequest {
    pub email: String,
    pub recaptcha_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// Public part of a user account returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: i32,
    pub name: String,
    pub mail: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub about_me: Option<String>,
    pub notify_forum: bool,
    pub notify_comments: bool,
    pub notify_books: bool,
    pub notify_news: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            user_id: u.id,
            name: u.name,
            mail: u.mail,
            role: u.role,
            avatar: u.avatar,
            about_me: u.about_me,
            notify_forum: u.notify_forum,
            notify_comments: u.notify_comments,
            notify_books: u.notify_books,
            notify_news: u.notify_news,
        }
    }
}

/// Response returned after register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}
