use sqlx::{Postgres, QueryBuilder};
use time::{Date, Month};

use super::dto::BookQueryParams;
use super::services::normalize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// How multiple category filters combine: `And` requires membership in
/// every listed category, `Or` (the default) in at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

/// Parsed catalog filters, shared by the "all books", "best rated",
/// "last added" and collection views.
#[derive(Debug, Clone)]
pub struct BookFilters {
    /// Half-open publication-date window `[from, to)`.
    pub date_range: Option<(Date, Date)>,
    pub categories: Vec<i32>,
    pub combinator: Combinator,
    /// Already-normalized free-text term.
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

/// Exactly four ASCII digits, anything else is silently ignored.
fn parse_year(s: &str) -> Option<i32> {
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn jan_first(year: i32) -> Option<Date> {
    Date::from_calendar_date(year, Month::January, 1).ok()
}

impl BookFilters {
    pub fn from_params(p: &BookQueryParams) -> Self {
        // Exact year takes precedence over a start/end range.
        let date_range = if let Some(year) = p.year.as_deref().and_then(parse_year) {
            jan_first(year).zip(jan_first(year + 1))
        } else {
            match (
                p.start.as_deref().and_then(parse_year),
                p.end.as_deref().and_then(parse_year),
            ) {
                (Some(start), Some(end)) => jan_first(start).zip(jan_first(end + 1)),
                _ => None,
            }
        };

        let categories = p
            .categories
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| s.trim().parse::<i32>().ok())
                    .collect()
            })
            .unwrap_or_default();

        let combinator = match p.combinator.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("and") || t.eq_ignore_ascii_case("et") => {
                Combinator::And
            }
            _ => Combinator::Or,
        };

        let search = p
            .search
            .as_deref()
            .map(normalize)
            .filter(|s| !s.is_empty());

        let limit = p
            .limit
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let page = p
            .page
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 1)
            .unwrap_or(1);

        Self {
            date_range,
            categories,
            combinator,
            search,
            page,
            limit,
        }
    }

    /// 1-based pagination. Saturates so absurd client-supplied page
    /// numbers cannot overflow into a negative OFFSET.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// The best-rated view reuses the predicate minus the text-search
    /// clause.
    pub fn without_search(mut self) -> Self {
        self.search = None;
        self
    }

    /// Appends the filter predicate to a query whose WHERE clause is
    /// already open (caller writes `WHERE 1=1` against alias `b`).
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if let Some((from, to)) = self.date_range {
            qb.push(" AND b.publication_date >= ");
            qb.push_bind(from);
            qb.push(" AND b.publication_date < ");
            qb.push_bind(to);
        }

        if !self.categories.is_empty() {
            match self.combinator {
                Combinator::And => {
                    // Conjunction of per-category membership tests.
                    for id in &self.categories {
                        qb.push(
                            " AND EXISTS (SELECT 1 FROM book_categories bc \
                             WHERE bc.book_id = b.id AND bc.category_id = ",
                        );
                        qb.push_bind(*id);
                        qb.push(")");
                    }
                }
                Combinator::Or => {
                    qb.push(
                        " AND EXISTS (SELECT 1 FROM book_categories bc \
                         WHERE bc.book_id = b.id AND bc.category_id = ANY(",
                    );
                    qb.push_bind(self.categories.clone());
                    qb.push("))");
                }
            }
        }

        if let Some(term) = &self.search {
            qb.push(" AND b.search_title LIKE ");
            qb.push_bind(format!("%{}%", term));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BookQueryParams {
        BookQueryParams::default()
    }

    fn sql_for(filters: &BookFilters) -> String {
        let mut qb = QueryBuilder::new("SELECT b.id FROM books b WHERE 1=1");
        filters.push_predicate(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn no_filters_means_no_predicate() {
        let f = BookFilters::from_params(&params());
        assert_eq!(sql_for(&f), "SELECT b.id FROM books b WHERE 1=1");
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn exact_year_becomes_half_open_window() {
        let f = BookFilters::from_params(&BookQueryParams {
            year: Some("1965".into()),
            ..params()
        });
        let (from, to) = f.date_range.unwrap();
        assert_eq!(from.year(), 1965);
        assert_eq!(to.year(), 1966);
        assert!(sql_for(&f).contains("b.publication_date >="));
    }

    #[test]
    fn year_wins_over_range() {
        let f = BookFilters::from_params(&BookQueryParams {
            year: Some("1965".into()),
            start: Some("1900".into()),
            end: Some("1950".into()),
            ..params()
        });
        assert_eq!(f.date_range.unwrap().0.year(), 1965);
    }

    #[test]
    fn range_end_is_inclusive() {
        let f = BookFilters::from_params(&BookQueryParams {
            start: Some("1900".into()),
            end: Some("1950".into()),
            ..params()
        });
        let (from, to) = f.date_range.unwrap();
        assert_eq!(from.year(), 1900);
        assert_eq!(to.year(), 1951);
    }

    #[test]
    fn malformed_year_is_silently_ignored() {
        for bad in ["19", "notayear", "19655", "12a4"] {
            let f = BookFilters::from_params(&BookQueryParams {
                year: Some(bad.into()),
                ..params()
            });
            assert!(f.date_range.is_none(), "{bad:?} should be ignored");
        }
    }

    #[test]
    fn or_combinator_uses_single_any_membership() {
        let f = BookFilters::from_params(&BookQueryParams {
            categories: Some("1,2,3".into()),
            ..params()
        });
        assert_eq!(f.combinator, Combinator::Or);
        let sql = sql_for(&f);
        assert_eq!(sql.matches("EXISTS").count(), 1);
        assert!(sql.contains("ANY("));
    }

    #[test]
    fn and_combinator_conjoins_per_category_tests() {
        let f = BookFilters::from_params(&BookQueryParams {
            categories: Some("1,2,3".into()),
            combinator: Some("and".into()),
            ..params()
        });
        assert_eq!(f.combinator, Combinator::And);
        let sql = sql_for(&f);
        assert_eq!(sql.matches("EXISTS").count(), 3);
        assert!(!sql.contains("ANY("));
    }

    #[test]
    fn search_term_is_normalized_before_binding() {
        let f = BookFilters::from_params(&BookQueryParams {
            search: Some("L'Étranger".into()),
            ..params()
        });
        assert_eq!(f.search.as_deref(), Some("letranger"));
        assert!(sql_for(&f).contains("b.search_title LIKE"));
    }

    #[test]
    fn pagination_is_one_based() {
        let f = BookFilters::from_params(&BookQueryParams {
            page: Some("2".into()),
            limit: Some("10".into()),
            ..params()
        });
        assert_eq!(f.offset(), 10);

        // Non-numeric limit falls back to the default.
        let f = BookFilters::from_params(&BookQueryParams {
            limit: Some("lots".into()),
            ..params()
        });
        assert_eq!(f.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(f.offset(), 0);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let f = BookFilters::from_params(&BookQueryParams {
            page: Some(i64::MAX.to_string()),
            limit: Some("10".into()),
            ..params()
        });
        assert_eq!(f.offset(), i64::MAX);

        let f = BookFilters::from_params(&BookQueryParams {
            page: Some("2".into()),
            limit: Some(i64::MAX.to_string()),
            ..params()
        });
        assert_eq!(f.offset(), i64::MAX);
    }

    #[test]
    fn without_search_drops_only_the_text_clause() {
        let f = BookFilters::from_params(&BookQueryParams {
            search: Some("dune".into()),
            categories: Some("4".into()),
            ..params()
        })
        .without_search();
        let sql = sql_for(&f);
        assert!(!sql.contains("search_title"));
        assert!(sql.contains("EXISTS"));
    }
}
