//! Pagination of index document lists.

use crate::document::DocId;
use std::{ops::Range, path::PathBuf};

/// One generated index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub file: PathBuf,
    pub url: String,
    pub docs: Vec<DocId>,
}

/// Page slices for `n` documents at `page_size` per page.
///
/// `page_size <= 0` yields a single page; an empty list still yields one
/// (empty) page.
pub fn page_ranges(n: usize, page_size: i64) -> Vec<Range<usize>> {
    let size = match usize::try_from(page_size) {
        Ok(size) if size > 0 => size,
        _ => return vec![0..n],
    };
    let count = n.div_ceil(size).max(1);
    (0..count)
        .map(|k| (k * size).min(n)..((k + 1) * size).min(n))
        .collect()
}

/// Split `docs` into pages. `file_name(k)` names page `k`; pages are
/// written under `dir` and linked at `url_dir`.
pub fn paginate(
    docs: &[DocId],
    page_size: i64,
    dir: &std::path::Path,
    url_dir: &str,
    file_name: impl Fn(usize) -> String,
) -> Vec<Page> {
    page_ranges(docs.len(), page_size)
        .into_iter()
        .enumerate()
        .map(|(i, range)| {
            let number = i + 1;
            let name = file_name(number);
            Page {
                number,
                file: dir.join(&name),
                url: crate::document::url_join(&[url_dir, &name]),
                docs: docs[range].to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_page_ranges() {
        assert_eq!(page_ranges(7, 3), vec![0..3, 3..6, 6..7]);
        assert_eq!(page_ranges(6, 3), vec![0..3, 3..6]);
        assert_eq!(page_ranges(0, 3), vec![0..0]);
        assert_eq!(page_ranges(7, 0), vec![0..7]);
        assert_eq!(page_ranges(7, -2), vec![0..7]);
    }

    #[test]
    fn test_pagination_law() {
        for n in 0..12 {
            for p in -1..5i64 {
                let ranges = page_ranges(n, p);
                let joined: Vec<usize> = ranges.iter().flat_map(|r| r.clone()).collect();
                assert_eq!(joined, (0..n).collect::<Vec<_>>());
                let expected = if p > 0 { n.div_ceil(p as usize).max(1) } else { 1 };
                assert_eq!(ranges.len(), expected);
            }
        }
    }

    #[test]
    fn test_paginate_names() {
        let pages = paginate(&[], 2, Path::new("/b/indexes/posts"), "indexes/posts", |n| {
            format!("tags/go-{n}.html")
        });
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].file, Path::new("/b/indexes/posts/tags/go-1.html"));
        assert_eq!(pages[0].url, "/indexes/posts/tags/go-1.html");
    }
}
