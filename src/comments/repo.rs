use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub content: String,
    pub rating: f64,
    pub created_at: OffsetDateTime,
}

/// Comment joined with its author's display fields.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub comment_id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub content: String,
    pub rating: f64,
    pub created_at: OffsetDateTime,
    pub user_name: String,
    pub user_avatar: Option<String>,
}

pub async fn list_for_book(db: &PgPool, book_id: i32) -> anyhow::Result<Vec<CommentView>> {
    let rows = sqlx::query_as::<_, CommentView>(
        "SELECT c.id AS comment_id, c.user_id, c.book_id, c.content, c.rating, c.created_at, \
                u.name AS user_name, u.avatar AS user_avatar \
         FROM comments c JOIN users u ON u.id = c.user_id \
         WHERE c.book_id = $1 ORDER BY c.created_at DESC",
    )
    .bind(book_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Insert-or-update keyed on (user, book): at most one comment per pair,
/// re-submission overwrites content and rating in place.
pub async fn upsert(
    db: &PgPool,
    user_id: i32,
    book_id: i32,
    content: &str,
    rating: f64,
) -> anyhow::Result<(CommentRow, bool)> {
    let existing = sqlx::query_as::<_, CommentRow>(
        "SELECT id, user_id, book_id, content, rating, created_at \
         FROM comments WHERE user_id = $1 AND book_id = $2",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(db)
    .await?;

    let row = match existing {
        Some(found) => {
            let updated = sqlx::query_as::<_, CommentRow>(
                "UPDATE comments SET content = $2, rating = $3 WHERE id = $1 \
                 RETURNING id, user_id, book_id, content, rating, created_at",
            )
            .bind(found.id)
            .bind(content)
            .bind(rating)
            .fetch_one(db)
            .await?;
            (updated, false)
        }
        None => {
            let inserted = sqlx::query_as::<_, CommentRow>(
                "INSERT INTO comments (user_id, book_id, content, rating) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, user_id, book_id, content, rating, created_at",
            )
            .bind(user_id)
            .bind(book_id)
            .bind(content)
            .bind(rating)
            .fetch_one(db)
            .await?;
            (inserted, true)
        }
    };

    refresh_average(db, book_id).await?;
    Ok(row)
}

/// Deletes the caller's own comment; Ok(false) when none existed.
pub async fn delete_own(db: &PgPool, user_id: i32, book_id: i32) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE user_id = $1 AND book_id = $2")
        .bind(user_id)
        .bind(book_id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    refresh_average(db, book_id).await?;
    Ok(true)
}

/// Moderation path: delete any comment by id, bypassing ownership.
pub async fn delete_by_id(db: &PgPool, comment_id: i32) -> anyhow::Result<bool> {
    let book_id: Option<i32> =
        sqlx::query_scalar("DELETE FROM comments WHERE id = $1 RETURNING book_id")
            .bind(comment_id)
            .fetch_optional(db)
            .await?;
    match book_id {
        Some(book_id) => {
            refresh_average(db, book_id).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Re-derives the book's denormalized average rating from the surviving
/// comments.
async fn refresh_average(db: &PgPool, book_id: i32) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE books SET average_rating = \
         (SELECT COALESCE(AVG(rating), 0) FROM comments WHERE book_id = $1) \
         WHERE id = $1",
    )
    .bind(book_id)
    .execute(db)
    .await?;
    Ok(())
}
