use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use super::role::{Role, UserStatus};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub mail: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar: Option<String>,
    pub about_me: Option<String>,
    pub notify_forum: bool,
    pub notify_comments: bool,
    pub notify_books: bool,
    pub notify_news: bool,
    pub created_at: OffsetDateTime,
}

pub(crate) const USER_COLUMNS: &str =
    "id, name, mail, password_hash, role, status, avatar, about_me, \
     notify_forum, notify_comments, notify_books, notify_news, created_at";

impl User {
    pub async fn find_by_mail(db: &PgPool, mail: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE mail = $1"
        ))
        .bind(mail)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        mail: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, mail, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(mail)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Partial profile update; unset fields keep their stored value.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_profile(
        db: &PgPool,
        id: i32,
        name: Option<&str>,
        mail: Option<&str>,
        about_me: Option<&str>,
        avatar: Option<&str>,
        notify_forum: Option<bool>,
        notify_comments: Option<bool>,
        notify_books: Option<bool>,
        notify_news: Option<bool>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                mail = COALESCE($3, mail), \
                about_me = COALESCE($4, about_me), \
                avatar = COALESCE($5, avatar), \
                notify_forum = COALESCE($6, notify_forum), \
                notify_comments = COALESCE($7, notify_comments), \
                notify_books = COALESCE($8, notify_books), \
                notify_news = COALESCE($9, notify_news) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(mail)
        .bind(about_me)
        .bind(avatar)
        .bind(notify_forum)
        .bind(notify_comments)
        .bind(notify_books)
        .bind(notify_news)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, id: i32, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_avatar(db: &PgPool, id: i32, avatar_url: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET avatar = $2 WHERE id = $1")
            .bind(id)
            .bind(avatar_url)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// Password-reset token: opaque, single-use, lazily purged once expired.
#[derive(Debug, Clone, FromRow)]
pub struct ResetToken {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

impl ResetToken {
    pub async fn create(
        db: &PgPool,
        user_id: i32,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find(db: &PgPool, token: &str) -> anyhow::Result<Option<ResetToken>> {
        let row = sqlx::query_as::<_, ResetToken>(
            "SELECT id, user_id, token, expires_at FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn consume(db: &PgPool, id: i32) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Lazy sweep of expired tokens, run before minting a new one.
    pub async fn purge_expired(db: &PgPool) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < now()")
            .execute(db)
            .await?;
        Ok(())
    }
}
