use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub author_id: i32,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub pinned: bool,
    pub locked: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i32,
    pub topic_id: i32,
    pub author_id: i32,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub content: String,
    pub created_at: OffsetDateTime,
}

const TOPIC_COLUMNS: &str =
    "id, title, content, author_id, author_name, author_avatar, pinned, locked, created_at";

const POST_COLUMNS: &str =
    "id, topic_id, author_id, author_name, author_avatar, content, created_at";

impl Topic {
    /// Pinned topics float above the rest, newest first within each group.
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics ORDER BY pinned DESC, created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(topics)
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<Topic>> {
        let topic = sqlx::query_as::<_, Topic>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(topic)
    }

    pub async fn create(
        db: &PgPool,
        title: &str,
        content: &str,
        author_id: i32,
        author_name: &str,
        author_avatar: Option<&str>,
        pinned: bool,
    ) -> anyhow::Result<Topic> {
        let topic = sqlx::query_as::<_, Topic>(&format!(
            "INSERT INTO topics (title, content, author_id, author_name, author_avatar, pinned) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(title)
        .bind(content)
        .bind(author_id)
        .bind(author_name)
        .bind(author_avatar)
        .bind(pinned)
        .fetch_one(db)
        .await?;
        Ok(topic)
    }

    /// Flips the flag in a single statement so two concurrent toggles
    /// always alternate instead of racing on a read-then-write.
    pub async fn toggle_pin(db: &PgPool, id: i32) -> anyhow::Result<Option<bool>> {
        let pinned =
            sqlx::query_scalar("UPDATE topics SET pinned = NOT pinned WHERE id = $1 RETURNING pinned")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(pinned)
    }

    pub async fn toggle_lock(db: &PgPool, id: i32) -> anyhow::Result<Option<bool>> {
        let locked =
            sqlx::query_scalar("UPDATE topics SET locked = NOT locked WHERE id = $1 RETURNING locked")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(locked)
    }

    /// Posts and topic go away together or not at all.
    pub async fn delete(db: &PgPool, id: i32) -> anyhow::Result<bool> {
        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM posts WHERE topic_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }
}

impl Post {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(posts)
    }

    pub async fn list_for_topic(db: &PgPool, topic_id: i32) -> anyhow::Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE topic_id = $1 ORDER BY created_at ASC"
        ))
        .bind(topic_id)
        .fetch_all(db)
        .await?;
        Ok(posts)
    }

    pub async fn create(
        db: &PgPool,
        topic_id: i32,
        author_id: i32,
        author_name: &str,
        author_avatar: Option<&str>,
        content: &str,
    ) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (topic_id, author_id, author_name, author_avatar, content) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {POST_COLUMNS}"
        ))
        .bind(topic_id)
        .bind(author_id)
        .bind(author_name)
        .bind(author_avatar)
        .bind(content)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    pub async fn delete(db: &PgPool, id: i32) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
