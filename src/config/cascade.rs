//! The configuration cascade.
//!
//! ```text
//! template/config.toml            root  (defaults + file + -var)
//! template/posts/config.yaml      layer
//! template/posts/2024/config.toml layer
//!
//! config_for(content/posts/2024/x.md)
//!   = root ⊕ posts ⊕ posts/2024, then globals restamped from root
//! ```

use super::{Config, ConfigError, ConfigLayer, RawConfig, SiteDirs};
use crate::{log, utils::fsx, verbose, verbose2};
use std::path::Path;
use walkdir::WalkDir;

const CONFIG_FILES: [&str; 2] = ["config.toml", "config.yaml"];

/// All configuration records of a site.
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    /// Resolved root configuration (defaults, root files, `-var` overrides).
    root: Config,
    /// Non-root layers sorted by ascending origin.
    layers: Vec<ConfigLayer>,
    content_dir: std::path::PathBuf,
    template_dir: std::path::PathBuf,
}

impl ConfigSet {
    /// Parse every configuration file in the template tree.
    ///
    /// Returns the set and the number of warnings logged.
    pub fn parse_all(dirs: &SiteDirs, vars: &RawConfig) -> Result<(Self, usize), ConfigError> {
        let mut root_layer = ConfigLayer::new(&dirs.template);
        let mut root_found = false;
        let mut layers = Vec::new();
        let mut warnings = 0;

        let walker = WalkDir::new(&dirs.template)
            .into_iter()
            .filter_entry(|e| e.path() != dirs.init.as_path());
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&dirs.template).to_path_buf();
                ConfigError::Io(path, e.into())
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            let is_root = dir == dirs.template.as_path();
            let mut layer = ConfigLayer::new(dir);
            let mut found = false;
            for name in CONFIG_FILES {
                let file = dir.join(name);
                if !fsx::file_exists(&file) {
                    continue;
                }
                found = true;
                verbose!("config"; "read config: {}", file.display());
                let raw = RawConfig::from_file(&file)?;
                let target = if is_root { &mut root_layer } else { &mut layer };
                target
                    .merge_raw(&raw, &dirs.build)
                    .map_err(|e| e.in_file(&file))?;
                if !is_root {
                    for name in raw.globals_set() {
                        log!("warn"; "root config variable \"{name}\" in non-root config file: \"{}\"", file.display());
                        warnings += 1;
                    }
                }
            }
            if found {
                if is_root {
                    root_found = true;
                } else {
                    layers.push(layer);
                }
            }
        }
        if !root_found {
            return Err(ConfigError::MissingRoot);
        }
        root_layer
            .merge_raw(vars, &dirs.build)
            .map_err(|e| match e {
                ConfigError::Validation(msg) => {
                    ConfigError::Validation(format!("config variable: {msg}"))
                }
                other => other,
            })?;
        layers.sort_by(|a, b| a.origin.cmp(&b.origin));

        let mut root = Config::default();
        root.merge(&root_layer);
        verbose2!("config"; "root config:\n{}", root.to_yaml());

        Ok((
            Self {
                root,
                layers,
                content_dir: dirs.content.clone(),
                template_dir: dirs.template.clone(),
            },
            warnings,
        ))
    }

    /// Merged configuration for content path `p`.
    ///
    /// # Panics
    /// If `p` is outside the content directory.
    pub fn config_for(&self, p: &Path) -> Config {
        let mut dir = fsx::path_translate(p, &self.content_dir, &self.template_dir);
        if !p.is_dir()
            && let Some(parent) = dir.parent()
        {
            dir = parent.to_path_buf();
        }
        let mut result = self.root.clone();
        for layer in &self.layers {
            if fsx::path_is_in_dir(&dir, &layer.origin) {
                result.merge(layer);
            }
        }
        result.stamp_globals(&self.root);
        result
    }

    /// The root configuration, home of the global variables.
    pub fn effective_global_config(&self) -> &Config {
        &self.root
    }

    /// True if content file `f` is excluded by the root `exclude` and not
    /// rescued by `include`.
    pub fn exclude(&self, f: &Path) -> bool {
        let Some(rel) = fsx::rel_slash(f, &self.content_dir) else {
            panic!("path outside content directory: {}", f.display());
        };
        self.root.exclude.matches(&rel) && !self.root.include.matches(&rel)
    }

    /// True if content file `f` matches `patterns` (content-relative).
    pub fn matches(&self, f: &Path, patterns: &crate::utils::pattern::Patterns) -> bool {
        fsx::rel_slash(f, &self.content_dir).is_some_and(|rel| patterns.matches(&rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[(&str, &str)]) -> (TempDir, SiteDirs) {
        let dir = TempDir::new().unwrap();
        for sub in ["content", "template"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        for (path, text) in files {
            let p = dir.path().join(path);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, text).unwrap();
        }
        let dirs = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap();
        (dir, dirs)
    }

    #[test]
    fn test_missing_root() {
        let (_dir, dirs) = site(&[("template/posts/config.toml", "paginate = 2")]);
        let err = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRoot));
    }

    #[test]
    fn test_cascade() {
        let (_dir, dirs) = site(&[
            ("template/config.toml", "paginate = 3\nurlprefix = \"/blog\"\n[user]\na = \"root\""),
            ("template/posts/config.yaml", "author: Ann\nurlprefix: /nope\nuser:\n  a: posts"),
            ("template/posts/2024/config.toml", "paginate = 10"),
            ("template/postscript/config.toml", "paginate = 99"),
            ("template/init/config.toml", "id = \"bogus\""),
            ("content/posts/2024/x.md", ""),
            ("content/posts/y.md", ""),
        ]);
        let (set, warnings) = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap();
        assert_eq!(warnings, 1);

        let deep = set.config_for(&dirs.content.join("posts/2024/x.md"));
        assert_eq!(deep.paginate, 10);
        assert_eq!(deep.author.as_deref(), Some("Ann"));
        assert_eq!(deep.urlprefix, "/blog");
        assert_eq!(deep.user["a"], "posts");

        let mid = set.config_for(&dirs.content.join("posts/y.md"));
        assert_eq!(mid.paginate, 3);

        let top = set.config_for(&dirs.content);
        assert_eq!(top.paginate, 3);
        assert_eq!(top.author, None);
        assert_eq!(set.effective_global_config().urlprefix, "/blog");
    }

    #[test]
    fn test_global_warning_per_file() {
        let (_dir, dirs) = site(&[
            ("template/config.toml", ""),
            ("template/posts/config.toml", "urlprefix = \"/x\""),
            ("template/posts/config.yaml", "author: Ann"),
        ]);
        let (_, warnings) = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_vars_override_root() {
        let (_dir, dirs) = site(&[("template/config.toml", "paginate = 3")]);
        let mut vars = RawConfig::default();
        vars.parse_var("paginate=8").unwrap();
        let (set, _) = ConfigSet::parse_all(&dirs, &vars).unwrap();
        assert_eq!(set.effective_global_config().paginate, 8);

        vars.parse_var("id=never").unwrap();
        let err = ConfigSet::parse_all(&dirs, &vars).unwrap_err();
        assert_eq!(err.to_string(), "config variable: illegal id: never");
    }

    #[test]
    fn test_exclude_include() {
        let (_dir, dirs) = site(&[(
            "template/config.toml",
            "exclude = \"*.bak|drafts/\"\ninclude = \"drafts/keep.md\"",
        )]);
        let (set, _) = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap();
        let c = |p: &str| dirs.content.join(p);
        assert!(set.exclude(&c("a/.hidden")));
        assert!(set.exclude(&c("x.bak")));
        assert!(set.exclude(&c("drafts/a.md")));
        assert!(!set.exclude(&c("drafts/keep.md")));
        assert!(!set.exclude(&c("posts/a.md")));
    }

    #[test]
    fn test_invalid_file_names_file() {
        let (_dir, dirs) = site(&[("template/config.toml", "id = \"bad\"")]);
        let err = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap_err();
        assert!(err.to_string().contains("config.toml\": illegal id: bad"));
    }
}
