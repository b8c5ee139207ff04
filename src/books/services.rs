use super::dto::BookView;

/// Folds a string for search: lowercase, accents stripped, punctuation
/// dropped, whitespace collapsed. Applied both when deriving a book's
/// `search_title` and to incoming search terms, so matching is symmetric.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.to_lowercase().chars() {
        match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' => out.push('a'),
            'ç' => out.push('c'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'î' | 'ï' | 'í' | 'ì' => out.push('i'),
            'ô' | 'ö' | 'ó' | 'ò' | 'õ' => out.push('o'),
            'û' | 'ü' | 'ù' | 'ú' => out.push('u'),
            'ÿ' | 'ý' => out.push('y'),
            'ñ' => out.push('n'),
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            c if c.is_ascii_alphanumeric() => out.push(c),
            c if c.is_whitespace() => out.push(' '),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The derived normalized-search field: folded title + author.
pub fn search_title(title: &str, author: &str) -> String {
    normalize(&format!("{} {}", title, author))
}

/// Storage-key component: alphanumeric plus dash/underscore, lowercased.
pub fn sanitize_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// "Best rated" shaping: stable sort by denormalized average rating,
/// descending, truncated to the top 5. Ties keep store order.
pub fn top_rated(mut views: Vec<BookView>) -> Vec<BookView> {
    views.sort_by(|a, b| {
        b.average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    views.truncate(5);
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::repo::BookStatus;
    use time::macros::date;

    #[test]
    fn normalize_folds_case_accents_and_punctuation() {
        assert_eq!(normalize("L'Étranger — Camus!"), "letranger camus");
        assert_eq!(normalize("  Dune   Herbert "), "dune herbert");
        assert_eq!(normalize("Œuvres complètes"), "oeuvres completes");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["L'Étranger — Camus!", "Ça va?", "already normal 42"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn search_title_concatenates_title_and_author() {
        assert_eq!(search_title("Dune", "Herbert"), "dune herbert");
    }

    #[test]
    fn sanitize_key_keeps_only_safe_chars() {
        assert_eq!(sanitize_key("Le Petit Prince!"), "lepetitprince");
        assert_eq!(sanitize_key("Foo_Bar-2"), "foo_bar-2");
    }

    fn view(title: &str, rating: f64) -> BookView {
        BookView {
            book_id: 0,
            title: title.into(),
            author: "a".into(),
            date: date!(2000 - 01 - 01),
            summary: None,
            status: BookStatus::Pending,
            categories: vec![],
            editors: vec![],
            cover_url: "c".into(),
            average_rating: rating,
        }
    }

    #[test]
    fn top_rated_sorts_desc_and_truncates_to_five() {
        let views = vec![
            view("a", 1.0),
            view("b", 4.5),
            view("c", 3.0),
            view("d", 5.0),
            view("e", 2.0),
            view("f", 4.0),
            view("g", 0.0),
        ];
        let top = top_rated(views);
        assert_eq!(top.len(), 5);
        let titles: Vec<_> = top.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "b", "f", "c", "e"]);
    }

    #[test]
    fn top_rated_ties_keep_store_order() {
        let top = top_rated(vec![view("first", 3.0), view("second", 3.0)]);
        assert_eq!(top[0].title, "first");
        assert_eq!(top[1].title, "second");
    }
}
