use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::books::dto::BookQueryParams;
use crate::books::repo::BookStatus;

/// Collection listing accepts the catalog date/category filters plus its
/// own read/noted/commented switches.
#[derive(Debug, Default, Deserialize)]
pub struct CollectionQueryParams {
    pub year: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub categories: Option<String>,
    #[serde(rename = "type")]
    pub combinator: Option<String>,
    pub is_read: Option<String>,
    pub noted: Option<String>,
    pub commented: Option<String>,
}

impl CollectionQueryParams {
    pub fn book_params(&self) -> BookQueryParams {
        BookQueryParams {
            year: self.year.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            categories: self.categories.clone(),
            combinator: self.combinator.clone(),
            ..BookQueryParams::default()
        }
    }

    pub fn read_only(&self) -> bool {
        self.is_read.as_deref() == Some("true")
    }

    pub fn noted_only(&self) -> bool {
        self.noted.as_deref() == Some("true")
    }

    pub fn commented_only(&self) -> bool {
        self.commented.as_deref() == Some("true")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCollectionRequest {
    pub book_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub cfi: Option<String>,
}

/// A collection entry joined with its book's display fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntryView {
    pub book_id: i32,
    pub is_read: bool,
    pub last_cfi: Option<String>,
    pub added_at: OffsetDateTime,
    pub title: String,
    pub author: String,
    pub date: Date,
    pub summary: Option<String>,
    #[serde(rename = "cover_url")]
    pub cover_url: Option<String>,
    pub status: BookStatus,
    pub average_rating: f64,
    pub comment_count: i64,
}
