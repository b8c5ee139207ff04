use serde::{Deserialize, Serialize};
use time::Date;

use super::repo::BookStatus;

/// Raw catalog query string; values arrive as strings and are validated
/// leniently (malformed filters are dropped, not rejected).
#[derive(Debug, Default, Deserialize)]
pub struct BookQueryParams {
    pub year: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Comma-separated category ids.
    pub categories: Option<String>,
    /// Combinator across categories: "and" | "or" (default "or").
    #[serde(rename = "type")]
    pub combinator: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Publication date, e.g. "1965-01-01".
    pub year: Option<String>,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<i32>,
    #[serde(default)]
    pub editor: Vec<i32>,
}

/// Privileged full update: associations are replaced wholesale.
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    pub title: String,
    pub author: String,
    pub year: String,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    pub status: BookStatus,
    #[serde(default)]
    pub categories: Vec<i32>,
    #[serde(default)]
    pub editor: Vec<i32>,
}

/// JSON shape of a catalog book.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub book_id: i32,
    pub title: String,
    pub author: String,
    pub date: Date,
    pub summary: Option<String>,
    pub status: BookStatus,
    pub categories: Vec<String>,
    pub editors: Vec<String>,
    #[serde(rename = "cover_url")]
    pub cover_url: String,
    pub average_rating: f64,
}

#[derive(Debug, Serialize)]
pub struct BookListResponse {
    pub books: Vec<BookView>,
    pub total: i64,
}

/// Simple named lookup row (categories, publishers).
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LookupView {
    pub id: i32,
    pub name: String,
}
