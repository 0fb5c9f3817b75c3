//! Unvalidated configuration values as read from files and `-var` options.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// Configuration variables before validation. `None` means "not set".
///
/// # Example
/// ```toml
/// author = "Joe Bloggs"
/// paginate = 10
/// urlprefix = "/blog"
/// exclude = "*.bak|drafts/"
///
/// [user]
/// banner = "Hello"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub author: Option<String>,
    pub exclude: Option<String>,
    pub homepage: Option<String>,
    pub id: Option<String>,
    pub include: Option<String>,
    pub longdate: Option<String>,
    pub mediumdate: Option<String>,
    pub paginate: Option<i64>,
    pub permalink: Option<String>,
    pub shortdate: Option<String>,
    pub templates: Option<String>,
    pub timezone: Option<String>,
    pub urlprefix: Option<String>,
    pub user: Option<BTreeMap<String, String>>,
}

impl RawConfig {
    /// Read a `config.toml` or `config.yaml` file. Top-level keys are
    /// case-insensitive.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let is_yaml = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            Self::from_yaml(&text).map_err(|e| ConfigError::Yaml(path.to_path_buf(), e))
        } else {
            Self::from_toml(&text).map_err(|e| ConfigError::Toml(path.to_path_buf(), e))
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(text)?;
        let lowered: toml::Table = table
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        toml::Value::Table(lowered).try_into()
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let lowered = match value {
            serde_yaml::Value::Mapping(map) => serde_yaml::Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| match k {
                        serde_yaml::Value::String(s) => (serde_yaml::Value::String(s.to_lowercase()), v),
                        other => (other, v),
                    })
                    .collect(),
            ),
            // An empty file parses as null.
            serde_yaml::Value::Null => return Ok(Self::default()),
            other => other,
        };
        serde_yaml::from_value(lowered)
    }

    /// Parse a `NAME=VALUE` command-line variable into this record.
    pub fn parse_var(&mut self, arg: &str) -> Result<(), ConfigError> {
        let Some((name, value)) = arg.split_once('=') else {
            return Err(ConfigError::Validation(format!("illegal -var syntax: {arg}")));
        };
        let value = value.to_owned();
        if let Some(key) = name.strip_prefix("user.") {
            self.user
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_owned(), value);
            return Ok(());
        }
        let slot = match name {
            "author" => &mut self.author,
            "exclude" => &mut self.exclude,
            "homepage" => &mut self.homepage,
            "id" => &mut self.id,
            "include" => &mut self.include,
            "longdate" => &mut self.longdate,
            "mediumdate" => &mut self.mediumdate,
            "permalink" => &mut self.permalink,
            "shortdate" => &mut self.shortdate,
            "templates" => &mut self.templates,
            "timezone" => &mut self.timezone,
            "urlprefix" => &mut self.urlprefix,
            "paginate" => {
                let n = value.trim().parse().map_err(|_| {
                    ConfigError::Validation(format!("illegal paginate value: {value}"))
                })?;
                self.paginate = Some(n);
                return Ok(());
            }
            _ => return Err(ConfigError::Validation(format!("illegal -var name: {name}"))),
        };
        *slot = Some(value);
        Ok(())
    }

    /// Overlay the values set in `other` onto this record.
    pub fn overlay(&mut self, other: Self) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            author, exclude, homepage, id, include, longdate, mediumdate, paginate, permalink,
            shortdate, templates, timezone, urlprefix
        );
        if let Some(user) = other.user {
            self.user.get_or_insert_with(BTreeMap::new).extend(user);
        }
    }

    /// Names of root-only variables set in this file.
    pub fn globals_set(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.homepage.is_some() {
            names.push("homepage");
        }
        if self.urlprefix.is_some() {
            names.push("urlprefix");
        }
        if self.exclude.is_some() {
            names.push("exclude");
        }
        if self.include.is_some() {
            names.push("include");
        }
        names
    }
}
