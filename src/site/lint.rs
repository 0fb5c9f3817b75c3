//! Link and element id validation (`-lint`).
//!
//! Runs after a full build over the `ids` and `urls` captured from each
//! rendered document:
//!
//! | Check               | Error                                      |
//! |---------------------|--------------------------------------------|
//! | id syntax           | `contains illicit element id: "ID"`        |
//! | id uniqueness       | `contains duplicate element id: "ID"`      |
//! | URL syntax          | `contains illicit URL: "URL"`              |
//! | `#frag` / `x#frag`  | `contains link to missing anchor: "URL"`   |
//! | intra-site target   | `contains link to missing file: "PATH"`    |

use super::Site;
use crate::{log, utils::fsx, verbose, verbose2};
use regex::Regex;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use url::Url;

static ELEMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][\w:.-]*$").unwrap());
static PAGE_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([\w][\w./-]*)$").unwrap());
static BASE_URL: LazyLock<Url> = LazyLock::new(|| Url::parse("http://localhost/").unwrap());

/// Intra-site link target.
#[derive(Debug, PartialEq, Eq)]
struct Link {
    /// Target build file.
    target: PathBuf,
    anchor: Option<String>,
}

/// Resolve `url` to its target build file. `None` for off-site URLs.
///
/// The query string is ignored and an empty fragment means no anchor.
fn parse_link(url: &str, urlprefix: &str, build_dir: &Path, doc_build_path: &Path) -> Option<Link> {
    let (url, anchor) = match url.split_once('#') {
        Some((url, anchor)) => (url, Some(anchor).filter(|a| !a.is_empty()).map(str::to_owned)),
        None => (url, None),
    };
    let url = url.split_once('?').map_or(url, |(path, _)| path);
    let mut target = if let Some(rel) = root_relative(url, urlprefix) {
        build_dir.join(unescape(rel))
    } else if let Some(caps) = PAGE_RELATIVE.captures(url) {
        doc_build_path
            .parent()
            .unwrap_or(build_dir)
            .join(unescape(&caps[1]))
    } else {
        return None;
    };
    if fsx::dir_exists(&target) {
        target.push("index.html");
    }
    Some(Link { target, anchor })
}

/// Build-relative part of a root-relative URL, optionally carrying
/// `urlprefix` (compared case-insensitively).
fn root_relative<'a>(url: &'a str, urlprefix: &str) -> Option<&'a str> {
    let rooted = |u: &'a str| {
        u.strip_prefix('/')
            .filter(|rest| !rest.is_empty() && !rest.starts_with('/'))
    };
    url.get(..urlprefix.len())
        .filter(|head| !urlprefix.is_empty() && head.eq_ignore_ascii_case(urlprefix))
        .and_then(|_| url.get(urlprefix.len()..))
        .and_then(rooted)
        .or_else(|| rooted(url))
}

fn unescape(s: &str) -> String {
    urlencoding::decode(s)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| s.to_owned())
}

impl Site {
    /// Lint every registered document; returns the error messages in content
    /// path order.
    pub(super) fn lint_checks(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let urlprefix = &self.configs.effective_global_config().urlprefix;
        let mut docs: Vec<_> = self.docs.iter().map(|(_, doc)| doc).collect();
        docs.sort_by(|a, b| a.content_path.cmp(&b.content_path));

        for doc in docs {
            verbose!("lint"; "lint document: {}", doc.content_path.display());
            let path = doc.content_path.display();

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for id in &doc.ids {
                *counts.entry(id).or_default() += 1;
            }
            for (id, count) in counts {
                if !ELEMENT_ID.is_match(id) {
                    errors.push(format!("{path}: contains illicit element id: \"{id}\""));
                }
                if count > 1 {
                    errors.push(format!("{path}: contains duplicate element id: \"{id}\""));
                }
            }

            for url in &doc.urls {
                if BASE_URL.join(url).is_err() {
                    errors.push(format!("{path}: contains illicit URL: \"{url}\""));
                    continue;
                }
                if let Some(frag) = url.strip_prefix('#') {
                    if !frag.is_empty() && !doc.ids.iter().any(|id| id == frag) {
                        errors.push(format!("{path}: contains link to missing anchor: \"{url}\""));
                    }
                    continue;
                }
                let Some(link) = parse_link(url, urlprefix, &self.dirs.build, &doc.build_path)
                else {
                    verbose2!("lint"; "{path}: skipped offsite link: \"{url}\"");
                    continue;
                };
                if !fsx::file_exists(&link.target) {
                    let rel = fsx::rel_slash(&link.target, &self.dirs.build)
                        .unwrap_or_else(|| link.target.display().to_string());
                    errors.push(format!("{path}: contains link to missing file: \"{rel}\""));
                    continue;
                }
                if let Some(anchor) = &link.anchor {
                    let found = self
                        .docs
                        .by_build_path(&link.target)
                        .is_some_and(|id| self.docs.get(id).ids.contains(anchor));
                    if !found {
                        let url = url
                            .strip_prefix(&format!("{urlprefix}/"))
                            .unwrap_or(url);
                        errors.push(format!("{path}: contains link to missing anchor: \"{url}\""));
                        continue;
                    }
                }
                verbose2!("lint"; "{path}: validated link: \"{url}\"");
            }
        }
        errors
    }

    /// Log lint errors; returns their count.
    pub(super) fn lint_and_log(&self) -> usize {
        let errors = self.lint_checks();
        for msg in &errors {
            log!("error"; "{}", self.dirs.shorten(msg));
        }
        errors.len()
    }
}
