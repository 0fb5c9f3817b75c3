//! Front matter extraction.
//!
//! The first line of a document selects the header format:
//!
//! | Opening | Format | Closing |
//! |---------|--------|---------|
//! | `---`   | YAML   | `---`   |
//! | `+++`   | TOML   | `+++`   |
//! | `<!--`  | YAML   | `-->`   |
//! | `/***`  | YAML   | `***/`  |
//!
//! After the header, a `<!--more-->` line splits the description from the
//! rest of the body.

use regex::Regex;
use serde::Deserialize;
use std::{collections::BTreeMap, sync::LazyLock};

const MORE: &str = "<!--more-->";

/// Unquoted TOML dates are rewritten as strings so they parse uniformly.
static TOML_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^[ \t]*date[ \t]*=[ \t]*([^" \t][^#\n\r]*)"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

/// A document split into header, description and body.
#[derive(Debug, Default, PartialEq)]
pub struct Split {
    pub format: Option<Format>,
    pub header: String,
    /// Text before `<!--more-->`; empty when there is no marker.
    pub description: String,
    /// Markup with the header removed (description included).
    pub body: String,
}

/// Separate the front matter header from the document text.
pub fn split(text: &str) -> Result<Split, String> {
    let mut lines = text.lines();
    let (format, end) = match lines.next() {
        Some("---") => (Format::Yaml, "---"),
        Some("+++") => (Format::Toml, "+++"),
        Some("<!--") => (Format::Yaml, "-->"),
        Some("/***") => (Format::Yaml, "***/"),
        _ => {
            return Ok(Split {
                body: text.to_owned(),
                ..Split::default()
            });
        }
    };
    let (header, closed) = read_to(&mut lines, Some(end));
    if !closed {
        return Err(format!("missing closing delimiter: {end}"));
    }
    let (before_more, found_more) = read_to(&mut lines, Some(MORE));
    let (description, body) = if found_more {
        let (rest, _) = read_to(&mut lines, None);
        (before_more.clone(), before_more + &rest)
    } else {
        (String::new(), before_more)
    };
    Ok(Split {
        format: Some(format),
        header,
        description,
        body,
    })
}

/// Collect lines up to (not including) `end`. Returns whether `end` was seen.
fn read_to<'a>(lines: &mut impl Iterator<Item = &'a str>, end: Option<&str>) -> (String, bool) {
    let mut text = String::new();
    for line in lines {
        if end == Some(line) {
            return (text, true);
        }
        text.push_str(line);
        text.push('\n');
    }
    (text, false)
}

/// Front matter variables. Keys are case-insensitive; unknown keys are ignored.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: String,
    pub date: String,
    pub description: String,
    pub author: Option<String>,
    pub templates: Option<String>,
    pub tags: Option<Vec<String>>,
    pub draft: bool,
    pub permalink: String,
    pub slug: String,
    pub layout: String,
    pub id: Option<String>,
    pub user: Option<BTreeMap<String, String>>,
}

impl FrontMatter {
    pub fn parse(format: Format, header: &str) -> Result<Self, String> {
        match format {
            Format::Toml => {
                let header = TOML_DATE.replace_all(header, r#"date="$1""#);
                let table: toml::Table = toml::from_str(&header).map_err(|e| e.to_string())?;
                let lowered: toml::Table = table
                    .into_iter()
                    .map(|(k, v)| (k.to_lowercase(), v))
                    .collect();
                toml::Value::Table(lowered)
                    .try_into()
                    .map_err(|e: toml::de::Error| e.to_string())
            }
            Format::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(header).map_err(|e| e.to_string())?;
                let serde_yaml::Value::Mapping(map) = value else {
                    return Ok(Self::default());
                };
                let lowered: serde_yaml::Mapping = map
                    .into_iter()
                    .map(|(k, v)| match k {
                        serde_yaml::Value::String(s) => (serde_yaml::Value::String(s.to_lowercase()), v),
                        other => (other, v),
                    })
                    .collect();
                serde_yaml::from_value(serde_yaml::Value::Mapping(lowered)).map_err(|e| e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_front_matter() {
        let s = split("# Title\n\nBody").unwrap();
        assert_eq!(s.format, None);
        assert_eq!(s.body, "# Title\n\nBody");
        assert!(s.description.is_empty());
    }

    #[test]
    fn test_yaml_with_more() {
        let s = split("---\ntitle: Hi\n---\nIntro.\n<!--more-->\nRest.\n").unwrap();
        assert_eq!(s.format, Some(Format::Yaml));
        assert_eq!(s.header, "title: Hi\n");
        assert_eq!(s.description, "Intro.\n");
        assert_eq!(s.body, "Intro.\nRest.\n");
    }

    #[test]
    fn test_other_delimiters() {
        let s = split("<!--\ntitle: A\n-->\nBody").unwrap();
        assert_eq!(s.header, "title: A\n");
        assert_eq!(s.body, "Body\n");
        let s = split("/***\ntitle: B\n***/\nBody").unwrap();
        assert_eq!(s.header, "title: B\n");
        let s = split("+++\ntitle = \"C\"\n+++\n").unwrap();
        assert_eq!(s.format, Some(Format::Toml));
        assert_eq!(s.body, "");
    }

    #[test]
    fn test_missing_closing_delimiter() {
        assert_eq!(
            split("+++\ntitle = \"x\"\n").unwrap_err(),
            "missing closing delimiter: +++"
        );
        assert_eq!(split("<!--\nx: 1\n").unwrap_err(), "missing closing delimiter: -->");
    }

    #[test]
    fn test_parse_yaml() {
        let fm = FrontMatter::parse(
            Format::Yaml,
            "Title: Hello\ntags: [intro, rust]\ndraft: true\nid: x1\nuser:\n  k: v\nextra: 1\n",
        )
        .unwrap();
        assert_eq!(fm.title, "Hello");
        assert_eq!(fm.tags, Some(vec!["intro".into(), "rust".into()]));
        assert!(fm.draft);
        assert_eq!(fm.id.as_deref(), Some("x1"));
        assert_eq!(fm.user.unwrap()["k"], "v");
        assert_eq!(FrontMatter::parse(Format::Yaml, "").unwrap(), FrontMatter::default());
    }

    #[test]
    fn test_parse_toml_unquoted_date() {
        let fm = FrontMatter::parse(
            Format::Toml,
            "title = \"T\"\ndate = 2023-07-15T10:00:00Z # comment\nslug = \"post\"\n",
        )
        .unwrap();
        assert_eq!(fm.date.trim(), "2023-07-15T10:00:00Z");
        assert_eq!(fm.slug, "post");
    }

    #[test]
    fn test_parse_error() {
        assert!(FrontMatter::parse(Format::Yaml, "title: [unclosed").is_err());
        assert!(FrontMatter::parse(Format::Toml, "title = ").is_err());
    }
}
