//! Tag slugs and file-name derived titles.

use regex::Regex;
use std::sync::LazyLock;

static DATED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}-.+").unwrap());

// ============================================================================
// Slugification
// ============================================================================

/// Convert `text` to a filesystem-safe slug not already present in `taken`.
///
/// Runs of non-alphanumeric characters collapse to `-`, the result is
/// trimmed of dashes and lower-cased. An empty result becomes `x`. A
/// collision appends `-2`, `-3`, ... until unique.
pub fn slugify<'a>(text: &str, taken: impl IntoIterator<Item = &'a str> + Clone) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_matches('-').to_owned();
    if slug.is_empty() {
        slug.push('x');
    }
    let is_taken = |s: &str| taken.clone().into_iter().any(|t| t == s);
    if is_taken(&slug) {
        let mut i = 2;
        while is_taken(&format!("{slug}-{i}")) {
            i += 1;
        }
        slug = format!("{slug}-{i}");
    }
    slug
}

// ============================================================================
// File Name Metadata
// ============================================================================

/// Split a file stem like `2024-01-02-hello-world` into
/// (`Some("2024-01-02")`, `"Hello World"`).
pub fn extract_date_title(stem: &str) -> (Option<&str>, String) {
    let (date, rest) = if DATED_NAME.is_match(stem) {
        (Some(&stem[..10]), &stem[11..])
    } else {
        (None, stem)
    };
    (date, title_case(&rest.replace('-', " ")))
}

/// Upper-case the first letter of every word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello, World!", []), "hello-world");
        assert_eq!(slugify("  --C++--  ", []), "c");
        assert_eq!(slugify("Go/Rust", []), "go-rust");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!", []), "x");
        assert_eq!(slugify("", []), "x");
    }

    #[test]
    fn test_slugify_collisions() {
        let taken = ["c", "c-2"];
        assert_eq!(slugify("C#", taken.iter().copied()), "c-3");
        assert_eq!(slugify("C", ["c"]), "c-2");
        assert_eq!(slugify("rust", taken.iter().copied()), "rust");
    }

    #[test]
    fn test_extract_date_title() {
        assert_eq!(
            extract_date_title("2024-01-02-hello-world"),
            (Some("2024-01-02"), "Hello World".to_string())
        );
        assert_eq!(extract_date_title("about-me"), (None, "About Me".to_string()));
        assert_eq!(extract_date_title("2024-01-02"), (None, "2024 01 02".to_string()));
    }
}
