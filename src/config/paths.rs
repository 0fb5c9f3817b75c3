//! Site directory resolution.
//!
//! ```text
//! site/                  -site (default ".")
//! ├── content/           -content
//! ├── template/          -template
//! │   └── init/          hardwired, skipped by builds
//! └── build/             -build
//!     └── indexes/       hardwired, generated index pages
//! ```

use super::{defaults::dirs, error::ConfigError};
use crate::utils::fsx;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Absolute site directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDirs {
    pub site: PathBuf,
    pub content: PathBuf,
    pub template: PathBuf,
    pub build: PathBuf,
    pub indexes: PathBuf,
    pub init: PathBuf,
}

impl SiteDirs {
    /// Resolve directories from optional overrides.
    ///
    /// Content and template directories must exist unless `for_init`.
    pub fn resolve(
        site: Option<&Path>,
        content: Option<&Path>,
        template: Option<&Path>,
        build: Option<&Path>,
        for_init: bool,
    ) -> Result<Self> {
        let site = fsx::absolute(site.unwrap_or(Path::new(".")))?;
        if !fsx::dir_exists(&site) {
            return Err(invalid(format!("missing site directory: {}", site.display())));
        }
        let pick = |opt: Option<&Path>, default: &str| match opt {
            Some(p) => fsx::absolute(p),
            None => Ok(site.join(default)),
        };
        let content = pick(content, dirs::CONTENT)?;
        let template = pick(template, dirs::TEMPLATE)?;
        let build = pick(build, dirs::BUILD)?;
        crate::verbose2!("dirs"; "content directory: {}", content.display());
        crate::verbose2!("dirs"; "template directory: {}", template.display());
        crate::verbose2!("dirs"; "build directory: {}", build.display());
        if !for_init {
            if !fsx::dir_exists(&content) {
                return Err(invalid(format!("missing content directory: {}", content.display())));
            }
            if !fsx::dir_exists(&template) {
                return Err(invalid(format!(
                    "missing template directory: {}",
                    template.display()
                )));
            }
        }
        let dirs = Self {
            indexes: build.join(dirs::INDEXES),
            init: template.join(dirs::INIT),
            site,
            content,
            template,
            build,
        };
        dirs.check_overlaps()?;
        Ok(dirs)
    }

    /// Content, template and build directories may not nest. The content
    /// directory may be the template `init` directory.
    fn check_overlaps(&self) -> Result<()> {
        if let Err(e) = check_overlap("content", &self.content, "template", &self.template)
            && self.content != self.init
        {
            return Err(e);
        }
        check_overlap("build", &self.build, "content", &self.content)?;
        check_overlap("build", &self.build, "template", &self.template)?;
        Ok(())
    }

    /// Strip the leading site directory from path names in a message.
    pub fn shorten(&self, msg: &str) -> String {
        let prefix = format!("{}{}", self.site.display(), std::path::MAIN_SEPARATOR);
        let msg = msg.replace(&format!(" {prefix}"), " ");
        msg.strip_prefix(&prefix).map(str::to_owned).unwrap_or(msg)
    }
}

fn check_overlap(name1: &str, dir1: &Path, name2: &str, dir2: &Path) -> Result<()> {
    if dir1 == dir2 {
        return Err(invalid(format!(
            "{name1} directory cannot be the same as {name2} directory"
        )));
    }
    if fsx::path_is_in_dir(dir1, dir2) {
        return Err(invalid(format!(
            "{name1} directory cannot reside inside {name2} directory"
        )));
    }
    if fsx::path_is_in_dir(dir2, dir1) {
        return Err(invalid(format!(
            "{name2} directory cannot reside inside {name1} directory"
        )));
    }
    Ok(())
}

fn invalid(msg: String) -> anyhow::Error {
    ConfigError::Validation(msg).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::create_dir_all(dir.path().join("template")).unwrap();
        dir
    }

    #[test]
    fn test_resolve_defaults() {
        let dir = site();
        let dirs = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap();
        assert_eq!(dirs.content, dir.path().join("content"));
        assert_eq!(dirs.indexes, dir.path().join("build/indexes"));
        assert_eq!(dirs.init, dir.path().join("template/init"));
    }

    #[test]
    fn test_missing_content() {
        let dir = TempDir::new().unwrap();
        let err = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap_err();
        assert!(err.to_string().starts_with("missing content directory"));
        assert!(SiteDirs::resolve(Some(dir.path()), None, None, None, true).is_ok());
    }

    #[test]
    fn test_overlaps() {
        let dir = site();
        let content = dir.path().join("content");
        let nested = dir.path().join("content/build");
        let err = SiteDirs::resolve(Some(dir.path()), None, None, Some(&nested), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "build directory cannot reside inside content directory"
        );
        let err = SiteDirs::resolve(Some(dir.path()), None, Some(&content), None, false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "content directory cannot be the same as template directory"
        );
    }

    #[test]
    fn test_content_may_be_init_dir() {
        let dir = site();
        let init = dir.path().join("template/init");
        fs::create_dir_all(&init).unwrap();
        assert!(SiteDirs::resolve(Some(dir.path()), Some(&init), None, None, false).is_ok());
    }

    #[test]
    fn test_shorten() {
        let dir = site();
        let dirs = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap();
        let msg = format!("{}: bad", dirs.content.join("a.md").display());
        assert_eq!(dirs.shorten(&msg), format!("content{}a.md: bad", std::path::MAIN_SEPARATOR));
    }
}
