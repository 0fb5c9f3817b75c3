//! Attribute-level rewriting and scanning of generated HTML.
//!
//! These are regex passes over `href="..."`/`src="..."`/`id="..."`
//! attributes, not an HTML parse.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ROOT_RELATIVE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(href|src)="(/[^"]*)""#).unwrap());
static URL_VALUE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(href|src)="([^"]*)""#).unwrap());
static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?i)\sid="([^"]+)""#).unwrap());
static URL_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s(?:href|src)="([^"]+)""#).unwrap());

/// Prepend `urlprefix` to root-relative `href`/`src` URLs.
///
/// Protocol-relative URLs (`//host`) and URLs that already carry the
/// prefix are left alone, so applying this twice equals applying it once.
pub fn inject_urlprefix(html: &str, urlprefix: &str) -> String {
    if urlprefix.is_empty() {
        return html.to_owned();
    }
    ROOT_RELATIVE_ATTR
        .replace_all(html, |caps: &Captures| {
            let (attr, url) = (&caps[1], &caps[2]);
            if url.starts_with("//") || unprefixed(url, urlprefix).is_some() {
                caps[0].to_owned()
            } else {
                format!("{attr}=\"{urlprefix}{url}\"")
            }
        })
        .into_owned()
}

/// Remove `urlprefix` from `href`/`src` URLs (used when serving locally).
pub fn strip_urlprefix(html: &str, urlprefix: &str) -> String {
    if urlprefix.is_empty() {
        return html.to_owned();
    }
    URL_VALUE_ATTR
        .replace_all(html, |caps: &Captures| {
            let (attr, url) = (&caps[1], &caps[2]);
            match unprefixed(url, urlprefix) {
                Some(rest) if rest.starts_with('/') => format!("{attr}=\"{rest}\""),
                Some(rest) => format!("{attr}=\"/{rest}\""),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// The remainder of `url` after a leading `urlprefix` path segment.
fn unprefixed<'a>(url: &'a str, urlprefix: &str) -> Option<&'a str> {
    url.strip_prefix(urlprefix)
        .filter(|rest| rest.is_empty() || rest.starts_with(['/', '#', '?']))
}

/// All element `id` attribute values, in document order.
pub fn scan_ids(html: &str) -> Vec<String> {
    ID_ATTR
        .captures_iter(html)
        .map(|c| c[1].to_owned())
        .collect()
}

/// All `href` and `src` attribute values, in document order.
pub fn scan_urls(html: &str) -> Vec<String> {
    URL_ATTR
        .captures_iter(html)
        .map(|c| c[1].to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_urlprefix() {
        let html = r#"<a href="/posts/x.html">x</a><img SRC="/img.png"><a href="//cdn/x">"#;
        assert_eq!(
            inject_urlprefix(html, "/blog"),
            r#"<a href="/blog/posts/x.html">x</a><img SRC="/blog/img.png"><a href="//cdn/x">"#
        );
    }

    #[test]
    fn test_inject_urlprefix_root_and_relative() {
        let html = r#"<a href="/">home</a><a href="rel.html">r</a>"#;
        assert_eq!(
            inject_urlprefix(html, "https://example.com"),
            r#"<a href="https://example.com/">home</a><a href="rel.html">r</a>"#
        );
    }

    #[test]
    fn test_inject_urlprefix_idempotent() {
        let html = r#"<a href="/a.html"></a><a href="/">h</a><a href="/blogroll.html"></a>"#;
        for prefix in ["/blog", "http://example.com/x"] {
            let once = inject_urlprefix(html, prefix);
            assert_eq!(inject_urlprefix(&once, prefix), once);
        }
        let once = inject_urlprefix(html, "/blog");
        assert!(once.contains(r#"href="/blog/blogroll.html""#));
    }

    #[test]
    fn test_inject_empty_prefix() {
        let html = r#"<a href="/x">"#;
        assert_eq!(inject_urlprefix(html, ""), html);
    }

    #[test]
    fn test_strip_urlprefix() {
        let html = r#"<a href="/blog/x.html"><img src="/blog/y.png">"#;
        assert_eq!(
            strip_urlprefix(html, "/blog"),
            r#"<a href="/x.html"><img src="/y.png">"#
        );
    }

    #[test]
    fn test_strip_urlprefix_attr_case() {
        let html = r#"<IMG SRC="/blog/y.png"><A HREF="/blog"><a href="/blogroll.html">"#;
        assert_eq!(
            strip_urlprefix(html, "/blog"),
            r#"<IMG SRC="/y.png"><A HREF="/"><a href="/blogroll.html">"#
        );
        let html = r#"<a Href="https://example.com/x/a.html">"#;
        assert_eq!(
            strip_urlprefix(html, "https://example.com/x"),
            r#"<a Href="/a.html">"#
        );
    }

    #[test]
    fn test_scan() {
        let html = r##"<h1 id="top">T</h1><a href="#top">t</a> <img src="a.png"><div data-x="1" ID="b"></div>"##;
        assert_eq!(scan_ids(html), vec!["top", "b"]);
        assert_eq!(scan_urls(html), vec!["#top", "a.png"]);
    }
}
