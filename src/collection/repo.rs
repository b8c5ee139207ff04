use sqlx::{PgPool, Postgres, QueryBuilder};

use super::dto::CollectionEntryView;
use crate::books::query::BookFilters;

pub enum AddOutcome {
    Added,
    BookMissing,
    AlreadyPresent,
}

/// Adds a book to the caller's collection; duplicates are rejected
/// explicitly, never silently upserted.
pub async fn add(db: &PgPool, user_id: i32, book_id: i32) -> anyhow::Result<AddOutcome> {
    let book_exists: Option<i32> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_optional(db)
        .await?;
    if book_exists.is_none() {
        return Ok(AddOutcome::BookMissing);
    }

    let already: Option<i32> =
        sqlx::query_scalar("SELECT book_id FROM collection WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(db)
            .await?;
    if already.is_some() {
        return Ok(AddOutcome::AlreadyPresent);
    }

    // A concurrent duplicate add can still slip between the check and the
    // insert; the primary key turns that race into an error rather than a
    // duplicate row.
    match sqlx::query("INSERT INTO collection (user_id, book_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(book_id)
        .execute(db)
        .await
    {
        Ok(_) => Ok(AddOutcome::Added),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(AddOutcome::AlreadyPresent),
        Err(e) => Err(e.into()),
    }
}

/// The caller's entries with book fields, filtered by the shared catalog
/// predicate and optionally by read state. The noted/commented switches
/// are applied by the handler after the fetch.
pub async fn list(
    db: &PgPool,
    user_id: i32,
    filters: &BookFilters,
    read_only: bool,
) -> anyhow::Result<Vec<CollectionEntryView>> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT c.book_id, c.is_read, c.last_cfi, c.added_at, \
                b.title, b.author, b.publication_date AS date, b.summary, b.cover_url, \
                b.status, b.average_rating, \
                (SELECT COUNT(*) FROM comments cm WHERE cm.book_id = b.id) AS comment_count \
         FROM collection c JOIN books b ON b.id = c.book_id \
         WHERE c.user_id = ",
    );
    qb.push_bind(user_id);
    filters.push_predicate(&mut qb);
    if read_only {
        qb.push(" AND c.is_read = TRUE");
    }
    qb.push(" ORDER BY c.added_at DESC");

    let rows = qb
        .build_query_as::<CollectionEntryView>()
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn remove(db: &PgPool, user_id: i32, book_id: i32) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM collection WHERE user_id = $1 AND book_id = $2")
        .bind(user_id)
        .bind(book_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_read(
    db: &PgPool,
    user_id: i32,
    book_id: i32,
    is_read: bool,
) -> anyhow::Result<bool> {
    let result =
        sqlx::query("UPDATE collection SET is_read = $3 WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .bind(is_read)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Stored reading position; outer None when there is no entry at all.
pub async fn get_cfi(
    db: &PgPool,
    user_id: i32,
    book_id: i32,
) -> anyhow::Result<Option<Option<String>>> {
    let row: Option<Option<String>> = sqlx::query_scalar(
        "SELECT last_cfi FROM collection WHERE user_id = $1 AND book_id = $2",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Records a reading position; false when the book is not in the
/// caller's collection.
pub async fn set_cfi(
    db: &PgPool,
    user_id: i32,
    book_id: i32,
    cfi: &str,
) -> anyhow::Result<bool> {
    let result =
        sqlx::query("UPDATE collection SET last_cfi = $3 WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .bind(cfi)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}
