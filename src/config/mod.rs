//! Site configuration: per-directory `config.toml`/`config.yaml` files
//! folded shallow-to-deep along a content path.
//!
//! # Variables
//!
//! | Variable      | Scope  | Purpose                                         |
//! |---------------|--------|-------------------------------------------------|
//! | `author`      | local  | Default document author                         |
//! | `templates`   | local  | Content files expanded as text templates        |
//! | `permalink`   | local  | URL template (`%y %m %d %f %p`)                 |
//! | `paginate`    | local  | Documents per index page (`<= 0` disables)      |
//! | `id`          | local  | `optional`, `mandatory` or `urlpath`            |
//! | `timezone`    | local  | IANA name or `Local`                            |
//! | `*date`       | local  | strftime formats for `shortdate` etc.           |
//! | `user`        | local  | Free-form key/values, merged additively         |
//! | `homepage`    | global | Build file copied to `/index.html`              |
//! | `urlprefix`   | global | Prepended to root-relative URLs                 |
//! | `exclude`     | global | Content files skipped by the build              |
//! | `include`     | global | Exceptions to `exclude`                         |
//!
//! Global variables are always taken from the root config.

mod cascade;
pub mod defaults;
mod error;
mod paths;
mod raw;

pub use cascade::ConfigSet;
pub use error::ConfigError;
pub use paths::SiteDirs;
pub use raw::RawConfig;

use crate::utils::{
    date::{self, TimeZone},
    fsx,
    pattern::Patterns,
};
use educe::Educe;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

static URLPREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://|/)[\w.~/-]*[^/]$").unwrap());

// ============================================================================
// Id Policy
// ============================================================================

/// How front matter `id` values are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    #[default]
    Optional,
    Mandatory,
    /// Missing ids default to the document URL path.
    UrlPath,
}

impl FromStr for IdPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optional" => Ok(Self::Optional),
            "mandatory" => Ok(Self::Mandatory),
            "urlpath" => Ok(Self::UrlPath),
            other => Err(ConfigError::Validation(format!("illegal id: {other}"))),
        }
    }
}

impl fmt::Display for IdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optional => "optional",
            Self::Mandatory => "mandatory",
            Self::UrlPath => "urlpath",
        })
    }
}

// ============================================================================
// Config Layer (one validated file)
// ============================================================================

/// Validated variables from one configuration directory. `None` means unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    /// Directory the configuration was read from.
    pub origin: PathBuf,
    pub author: Option<String>,
    pub templates: Option<Patterns>,
    pub homepage: Option<PathBuf>,
    pub paginate: Option<i64>,
    pub urlprefix: Option<String>,
    pub permalink: Option<String>,
    pub id: Option<IdPolicy>,
    pub exclude: Option<Patterns>,
    pub include: Option<Patterns>,
    pub timezone: Option<TimeZone>,
    pub user: BTreeMap<String, String>,
    pub shortdate: Option<String>,
    pub mediumdate: Option<String>,
    pub longdate: Option<String>,
}

impl ConfigLayer {
    pub fn new(origin: &Path) -> Self {
        Self {
            origin: origin.to_path_buf(),
            ..Self::default()
        }
    }

    /// Validate `raw` and merge the variables it sets into this layer.
    pub fn merge_raw(&mut self, raw: &RawConfig, build_dir: &Path) -> Result<(), ConfigError> {
        let invalid = ConfigError::Validation;
        if let Some(author) = &raw.author {
            self.author = Some(author.clone());
        }
        if let Some(templates) = &raw.templates {
            self.templates = Some(Patterns::parse(templates).map_err(invalid)?);
        }
        if let Some(permalink) = &raw.permalink {
            self.permalink = Some(permalink.clone());
        }
        if let Some(home) = &raw.homepage {
            self.homepage = Some(resolve_homepage(home, build_dir)?);
        }
        if let Some(id) = &raw.id {
            self.id = Some(id.parse()?);
        }
        if let Some(paginate) = raw.paginate {
            self.paginate = Some(paginate);
        }
        if let Some(prefix) = &raw.urlprefix {
            if !prefix.is_empty() && !URLPREFIX.is_match(prefix) {
                return Err(invalid(format!("illegal urlprefix: {prefix}")));
            }
            self.urlprefix = Some(prefix.clone());
        }
        if let Some(exclude) = &raw.exclude {
            self.exclude = Some(Patterns::parse_with_hidden_guard(exclude).map_err(invalid)?);
        }
        if let Some(include) = &raw.include {
            self.include = Some(Patterns::parse(include).map_err(invalid)?);
        }
        if let Some(tz) = &raw.timezone {
            self.timezone = Some(tz.parse().map_err(invalid)?);
        }
        for (slot, value) in [
            (&mut self.shortdate, &raw.shortdate),
            (&mut self.mediumdate, &raw.mediumdate),
            (&mut self.longdate, &raw.longdate),
        ] {
            if let Some(format) = value {
                date::validate_format(format).map_err(invalid)?;
                *slot = Some(format.clone());
            }
        }
        if let Some(user) = &raw.user {
            self.user.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(())
    }
}

fn resolve_homepage(home: &str, build_dir: &Path) -> Result<PathBuf, ConfigError> {
    let invalid = ConfigError::Validation;
    let rel = Path::new(home);
    if rel.is_absolute() || home.starts_with('/') {
        return Err(invalid(format!(
            "homepage must be relative to the build directory: {}",
            build_dir.display()
        )));
    }
    let path = fsx::clean(&build_dir.join(rel));
    if !fsx::path_is_in_dir(&path, build_dir) {
        return Err(invalid(format!(
            "homepage must reside in build directory: {}",
            build_dir.display()
        )));
    }
    if fsx::dir_exists(&path) {
        return Err(invalid(format!(
            "homepage cannot be a directory: {}",
            path.display()
        )));
    }
    Ok(path)
}

// ============================================================================
// Resolved Config
// ============================================================================

/// Fully resolved configuration for one content path.
#[derive(Debug, Clone, PartialEq, Educe)]
#[educe(Default)]
pub struct Config {
    /// Origin of the deepest layer merged in.
    pub origin: PathBuf,
    pub author: Option<String>,
    pub templates: Patterns,
    pub homepage: Option<PathBuf>,
    #[educe(Default = defaults::paginate())]
    pub paginate: i64,
    /// Empty when unset; never ends with `/`.
    pub urlprefix: String,
    pub permalink: String,
    pub id: IdPolicy,
    #[educe(Default = defaults::exclude())]
    pub exclude: Patterns,
    pub include: Patterns,
    pub timezone: TimeZone,
    pub user: BTreeMap<String, String>,
    #[educe(Default = defaults::shortdate())]
    pub shortdate: String,
    #[educe(Default = defaults::mediumdate())]
    pub mediumdate: String,
    #[educe(Default = defaults::longdate())]
    pub longdate: String,
}

impl Config {
    /// Merge every variable set in `layer` (user values are additive).
    pub fn merge(&mut self, layer: &ConfigLayer) {
        self.origin = layer.origin.clone();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = &layer.$field {
                    self.$field = v.clone();
                })*
            };
        }
        take!(
            templates, paginate, urlprefix, permalink, id, exclude, include, timezone, shortdate,
            mediumdate, longdate
        );
        if layer.author.is_some() {
            self.author = layer.author.clone();
        }
        if layer.homepage.is_some() {
            self.homepage = layer.homepage.clone();
        }
        self.user
            .extend(layer.user.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Overwrite the global variables with those of `root`.
    pub fn stamp_globals(&mut self, root: &Config) {
        self.exclude = root.exclude.clone();
        self.include = root.include.clone();
        self.homepage = root.homepage.clone();
        self.urlprefix = root.urlprefix.clone();
    }

    pub fn shortdate(&self, d: Option<&date::Date>) -> String {
        date::format_date(d, self.timezone, &self.shortdate)
    }

    pub fn mediumdate(&self, d: Option<&date::Date>) -> String {
        date::format_date(d, self.timezone, &self.mediumdate)
    }

    pub fn longdate(&self, d: Option<&date::Date>) -> String {
        date::format_date(d, self.timezone, &self.longdate)
    }

    /// Variables as YAML, for verbose output.
    pub fn to_yaml(&self) -> String {
        let mut map: BTreeMap<&str, serde_yaml::Value> = BTreeMap::new();
        let s = |v: &str| serde_yaml::Value::String(v.to_owned());
        map.insert("author", s(self.author.as_deref().unwrap_or_default()));
        map.insert("templates", s(&self.templates.to_string()));
        map.insert(
            "homepage",
            s(&self.homepage.as_ref().map(|p| p.display().to_string()).unwrap_or_default()),
        );
        map.insert("paginate", serde_yaml::Value::from(self.paginate));
        map.insert("urlprefix", s(&self.urlprefix));
        map.insert("permalink", s(&self.permalink));
        map.insert("id", s(&self.id.to_string()));
        map.insert("exclude", s(&self.exclude.to_string()));
        map.insert("include", s(&self.include.to_string()));
        map.insert("timezone", s(&self.timezone.to_string()));
        map.insert("shortdate", s(&self.shortdate));
        map.insert("mediumdate", s(&self.mediumdate));
        map.insert("longdate", s(&self.longdate));
        map.insert(
            "user",
            serde_yaml::to_value(&self.user).unwrap_or(serde_yaml::Value::Null),
        );
        serde_yaml::to_string(&map).unwrap_or_default()
    }
}
