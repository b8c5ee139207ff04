use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use super::dto::LookupView;
use super::query::BookFilters;

/// Moderation state machine for a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "book_status", rename_all = "lowercase")]
pub enum BookStatus {
    Pending,
    Validated,
    Rejected,
}

#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: i32,
    pub title: String,
    pub search_title: String,
    pub author: String,
    pub publication_date: Date,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    pub ebook_url: Option<String>,
    pub status: BookStatus,
    pub validated_by: Option<i32>,
    pub average_rating: f64,
    pub created_at: OffsetDateTime,
}

const BOOK_COLUMNS: &str = "b.id, b.title, b.search_title, b.author, b.publication_date, \
     b.summary, b.cover_url, b.ebook_url, b.status, b.validated_by, b.average_rating, \
     b.created_at";

/// Filtered page of books plus the total matching the same predicate.
pub async fn list(
    db: &PgPool,
    filters: &BookFilters,
) -> anyhow::Result<(Vec<BookRow>, i64)> {
    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b WHERE 1=1");
    filters.push_predicate(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE 1=1"
    ));
    filters.push_predicate(&mut qb);
    qb.push(" ORDER BY b.created_at DESC LIMIT ");
    qb.push_bind(filters.limit);
    qb.push(" OFFSET ");
    qb.push_bind(filters.offset());
    let rows = qb.build_query_as::<BookRow>().fetch_all(db).await?;

    Ok((rows, total))
}

/// Every book matching the predicate, unpaged; the best-rated view sorts
/// and truncates in memory after this.
pub async fn list_unpaged(db: &PgPool, filters: &BookFilters) -> anyhow::Result<Vec<BookRow>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE 1=1"
    ));
    filters.push_predicate(&mut qb);
    let rows = qb.build_query_as::<BookRow>().fetch_all(db).await?;
    Ok(rows)
}

/// Five most recently added books matching the predicate, sorted at the
/// store level.
pub async fn last_added(db: &PgPool, filters: &BookFilters) -> anyhow::Result<Vec<BookRow>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE 1=1"
    ));
    filters.push_predicate(&mut qb);
    qb.push(" ORDER BY b.created_at DESC LIMIT 5");
    let rows = qb.build_query_as::<BookRow>().fetch_all(db).await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<BookRow>> {
    let row = sqlx::query_as::<_, BookRow>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_by_title(db: &PgPool, title: &str) -> anyhow::Result<Option<BookRow>> {
    let row = sqlx::query_as::<_, BookRow>(&format!(
        "SELECT {BOOK_COLUMNS} FROM books b WHERE b.title = $1"
    ))
    .bind(title)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Year of the oldest catalog entry, None while the catalog is empty.
pub async fn min_year(db: &PgPool) -> anyhow::Result<Option<i32>> {
    let date: Option<Date> = sqlx::query_scalar(
        "SELECT publication_date FROM books ORDER BY publication_date ASC LIMIT 1",
    )
    .fetch_optional(db)
    .await?;
    Ok(date.map(|d| d.year()))
}

pub struct NewBook<'a> {
    pub title: &'a str,
    pub search_title: &'a str,
    pub author: &'a str,
    pub publication_date: Date,
    pub summary: Option<&'a str>,
    pub cover_url: Option<&'a str>,
}

/// Inserts a pending book with its category/publisher join rows in one
/// transaction.
pub async fn create(
    db: &PgPool,
    book: NewBook<'_>,
    category_ids: &[i32],
    publisher_ids: &[i32],
) -> anyhow::Result<BookRow> {
    let mut tx = db.begin().await?;

    let row = sqlx::query_as::<_, BookRow>(&format!(
        "INSERT INTO books (title, search_title, author, publication_date, summary, cover_url) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {}",
        BOOK_COLUMNS.replace("b.", "")
    ))
    .bind(book.title)
    .bind(book.search_title)
    .bind(book.author)
    .bind(book.publication_date)
    .bind(book.summary)
    .bind(book.cover_url)
    .fetch_one(&mut *tx)
    .await?;

    for cat in category_ids {
        sqlx::query("INSERT INTO book_categories (book_id, category_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(cat)
            .execute(&mut *tx)
            .await?;
    }
    for publisher in publisher_ids {
        sqlx::query("INSERT INTO book_publishers (book_id, publisher_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(publisher)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(row)
}

pub struct BookUpdate<'a> {
    pub title: &'a str,
    pub search_title: &'a str,
    pub author: &'a str,
    pub publication_date: Date,
    pub summary: Option<&'a str>,
    pub cover_url: Option<&'a str>,
    pub status: BookStatus,
    pub validated_by: i32,
}

/// Full-replace statement: every scalar field is overwritten, an absent
/// cover clears the stored one.
fn update_sql() -> String {
    format!(
        "UPDATE books SET title = $2, search_title = $3, author = $4, publication_date = $5, \
         summary = $6, cover_url = $7, status = $8, validated_by = $9 \
         WHERE id = $1 RETURNING {}",
        BOOK_COLUMNS.replace("b.", "")
    )
}

/// Privileged full replace; association sets are deleted and recreated,
/// not diffed.
pub async fn update(
    db: &PgPool,
    id: i32,
    update: BookUpdate<'_>,
    category_ids: &[i32],
    publisher_ids: &[i32],
) -> anyhow::Result<Option<BookRow>> {
    let mut tx = db.begin().await?;

    let row = sqlx::query_as::<_, BookRow>(&update_sql())
    .bind(id)
    .bind(update.title)
    .bind(update.search_title)
    .bind(update.author)
    .bind(update.publication_date)
    .bind(update.summary)
    .bind(update.cover_url)
    .bind(update.status)
    .bind(update.validated_by)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query("DELETE FROM book_categories WHERE book_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM book_publishers WHERE book_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    for cat in category_ids {
        sqlx::query("INSERT INTO book_categories (book_id, category_id) VALUES ($1, $2)")
            .bind(id)
            .bind(cat)
            .execute(&mut *tx)
            .await?;
    }
    for publisher in publisher_ids {
        sqlx::query("INSERT INTO book_publishers (book_id, publisher_id) VALUES ($1, $2)")
            .bind(id)
            .bind(publisher)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(Some(row))
}

pub async fn set_cover(db: &PgPool, id: i32, url: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE books SET cover_url = $2 WHERE id = $1")
        .bind(id)
        .bind(url)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_ebook(db: &PgPool, id: i32, url: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE books SET ebook_url = $2 WHERE id = $1")
        .bind(id)
        .bind(url)
        .execute(db)
        .await?;
    Ok(())
}

/// Category and publisher names for a set of books, keyed by book id.
pub async fn labels(
    db: &PgPool,
    book_ids: &[i32],
) -> anyhow::Result<HashMap<i32, (Vec<String>, Vec<String>)>> {
    let mut map: HashMap<i32, (Vec<String>, Vec<String>)> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(map);
    }

    let cats: Vec<(i32, String)> = sqlx::query_as(
        "SELECT bc.book_id, c.name FROM book_categories bc \
         JOIN categories c ON c.id = bc.category_id \
         WHERE bc.book_id = ANY($1) ORDER BY c.name",
    )
    .bind(book_ids)
    .fetch_all(db)
    .await?;
    for (book_id, name) in cats {
        map.entry(book_id).or_default().0.push(name);
    }

    let pubs: Vec<(i32, String)> = sqlx::query_as(
        "SELECT bp.book_id, p.name FROM book_publishers bp \
         JOIN publishers p ON p.id = bp.publisher_id \
         WHERE bp.book_id = ANY($1) ORDER BY p.name",
    )
    .bind(book_ids)
    .fetch_all(db)
    .await?;
    for (book_id, name) in pubs {
        map.entry(book_id).or_default().1.push(name);
    }

    Ok(map)
}

pub async fn categories(db: &PgPool) -> anyhow::Result<Vec<LookupView>> {
    let rows = sqlx::query_as::<_, LookupView>(
        "SELECT id, name FROM categories ORDER BY name ASC",
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn publishers(db: &PgPool) -> anyhow::Result<Vec<LookupView>> {
    let rows = sqlx::query_as::<_, LookupView>(
        "SELECT id, name FROM publishers ORDER BY name ASC",
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_every_field_including_cover() {
        let sql = update_sql();
        assert!(sql.contains("cover_url = $7"));
        assert!(!sql.contains("COALESCE"));
    }
}
