//! Content documents.
//!
//! A document is a `.md` or `.rmu` file under the content directory. Parsing
//! derives everything the build needs from the file and the configuration
//! cascade:
//!
//! ```text
//! content/posts/2024-01-02-hello.md
//!   ├── title/date   ← file name, then front matter
//!   ├── conf         ← config_for(content path)
//!   ├── build_path   ← build/posts/2024-01-02-hello.html  (or permalink)
//!   ├── url          ← /posts/2024-01-02-hello.html
//!   ├── layout       ← nearest template layout.html
//!   └── id           ← id policy
//! ```
//!
//! Documents are owned by the [`Registry`]; indexes refer to them by [`DocId`].

mod front_matter;
mod registry;

pub use front_matter::FrontMatter;
pub use registry::{DocId, Registry};

#[cfg(test)]
pub(crate) use registry::tests::doc as test_doc;

use crate::{
    config::{Config, ConfigSet, IdPolicy, SiteDirs},
    index::IndexId,
    utils::{
        date::{self, Date},
        fsx,
        pattern::Patterns,
        slug,
    },
};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// File extensions of markup documents.
pub const DOCUMENT_EXTS: [&str; 2] = [".md", ".rmu"];

/// True for `.md`/`.rmu` files.
pub fn is_document_path(path: &Path) -> bool {
    DOCUMENT_EXTS.contains(&fsx::ext(path).as_str())
}

/// Site state a document is parsed against.
pub struct ParseContext<'a> {
    pub dirs: &'a SiteDirs,
    pub configs: &'a ConfigSet,
    /// Every `layout.html` in the template tree.
    pub layouts: &'a [PathBuf],
    /// `-drafts`: publish drafts.
    pub drafts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content_path: PathBuf,
    pub build_path: PathBuf,
    /// Mirror of `content_path` under the template directory.
    pub template_path: PathBuf,
    pub url: String,
    pub id: Option<String>,
    pub conf: Config,

    pub title: String,
    pub date: Option<Date>,
    pub modtime: DateTime<Local>,
    pub author: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub draft: bool,
    pub permalink: String,
    pub slug: String,
    /// Template name of the layout.
    pub layout: String,
    pub templates: Patterns,
    pub user: BTreeMap<String, String>,

    /// Markup with the front matter removed.
    pub content: String,
    /// Element ids of the rendered page (collected when linting).
    pub ids: Vec<String>,
    /// `href`/`src` URLs of the rendered page (collected when linting).
    pub urls: Vec<String>,

    pub primary_index: Option<IndexId>,
    /// Unpublished draft (draft without `-drafts`).
    pub unpublished: bool,
}

impl Document {
    /// Parse a content document.
    ///
    /// Errors are prefixed with the content path.
    ///
    /// # Panics
    /// If `path` is outside the content directory.
    pub fn parse(path: &Path, ctx: &ParseContext) -> Result<Self> {
        let mut doc = Self::read(path, ctx)?;
        doc.synthesize_paths(ctx)
            .and_then(|()| doc.resolve_layout(ctx))
            .and_then(|()| doc.apply_id_policy())
            .map_err(|e| anyhow!("{}: {e}", path.display()))?;
        Ok(doc)
    }

    /// Parse a static file that is rendered as a text template. The build
    /// path mirrors the content path and no layout is needed.
    pub fn parse_static(path: &Path, ctx: &ParseContext) -> Result<Self> {
        let mut doc = Self::read(path, ctx)?;
        doc.build_path = fsx::path_translate(path, &ctx.dirs.content, &ctx.dirs.build);
        let rel = fsx::rel_slash(path, &ctx.dirs.content).unwrap_or_default();
        doc.url = url_join(&[&rel]);
        Ok(doc)
    }

    /// File name metadata, front matter and body.
    fn read(path: &Path, ctx: &ParseContext) -> Result<Self> {
        let dirs = ctx.dirs;
        if !fsx::path_is_in_dir(path, &dirs.content) {
            panic!("document is outside content directory: {}", path.display());
        }
        let fail = |e: String| anyhow!("{}: {e}", path.display());
        let conf = ctx.configs.config_for(path);
        let modtime = fsx::mod_time(path)?;
        let stem = fsx::file_stem(path);
        let (file_date, title) = slug::extract_date_title(&stem);
        let date = file_date
            .map(|d| date::parse_date(d, conf.timezone))
            .transpose()
            .map_err(fail)?;
        let text = fsx::read_text(path)?;
        let split = front_matter::split(&text).map_err(|e| fail(format!("front matter: {e}")))?;

        let mut doc = Self {
            content_path: fsx::clean(path),
            build_path: PathBuf::new(),
            template_path: fsx::path_translate(path, &dirs.content, &dirs.template),
            url: String::new(),
            id: None,
            title,
            date,
            modtime,
            author: conf.author.clone(),
            description: split.description,
            tags: Vec::new(),
            draft: false,
            permalink: conf.permalink.clone(),
            slug: String::new(),
            layout: String::new(),
            templates: conf.templates.clone(),
            user: BTreeMap::new(),
            content: split.body,
            ids: Vec::new(),
            urls: Vec::new(),
            primary_index: None,
            unpublished: false,
            conf,
        };
        if let Some(format) = split.format {
            let fm = FrontMatter::parse(format, &split.header)
                .map_err(|e| fail(format!("front matter: {e}")))?;
            doc.merge_front_matter(fm)
                .map_err(|e| fail(format!("front matter: {e}")))?;
        }
        doc.unpublished = doc.draft && !ctx.drafts;
        Ok(doc)
    }

    fn merge_front_matter(&mut self, fm: FrontMatter) -> Result<(), String> {
        if !fm.title.is_empty() {
            self.title = fm.title;
        }
        if !fm.date.trim().is_empty() {
            self.date = Some(date::parse_date(&fm.date, self.conf.timezone)?);
        }
        if fm.author.is_some() {
            self.author = fm.author;
        }
        if fm.id.is_some() {
            self.id = fm.id;
        }
        if let Some(templates) = fm.templates {
            self.templates = Patterns::parse(&templates)?;
        }
        if !fm.permalink.is_empty() {
            self.permalink = fm.permalink;
        }
        if !fm.description.is_empty() {
            self.description = fm.description;
        }
        if let Some(tags) = fm.tags {
            self.tags = tags;
        }
        // Once a draft, always a draft.
        self.draft |= fm.draft;
        if !fm.slug.is_empty() {
            self.slug = fm.slug;
        }
        if !fm.layout.is_empty() {
            self.layout = fm.layout;
        }
        if let Some(user) = fm.user {
            self.user = user;
        }
        Ok(())
    }

    /// Build path and URL from the content path, `slug` and `permalink`.
    fn synthesize_paths(&mut self, ctx: &ParseContext) -> Result<()> {
        let dirs = ctx.dirs;
        let rel = fsx::rel_slash(&self.content_path, &dirs.content).unwrap_or_default();
        let (rel_dir, name) = match rel.rsplit_once('/') {
            Some((d, n)) => (d, n),
            None => ("", rel.as_str()),
        };
        let mut file = name.to_owned();
        if is_document_path(Path::new(name)) {
            file = fsx::replace_ext(&file, ".html");
        }
        if !self.slug.is_empty() {
            file = format!("{}{}", self.slug, fsx::ext(Path::new(&file)));
        }
        if self.permalink.is_empty() {
            self.build_path = fsx::clean(&dirs.build.join(rel_dir).join(&file));
            self.url = url_join(&[rel_dir, &file]);
            return Ok(());
        }
        let link = self.expand_permalink(&file)?;
        let link = link.trim_start_matches('/');
        if link.ends_with('/') {
            // Pretty URL.
            self.build_path = fsx::clean(&dirs.build.join(link).join("index.html"));
            self.url = format!("{}/", url_join(&[link]).trim_end_matches('/'));
        } else {
            self.build_path = fsx::clean(&dirs.build.join(link));
            self.url = url_join(&[link]);
        }
        Ok(())
    }

    fn expand_permalink(&self, file: &str) -> Result<String> {
        let link = &self.permalink;
        let mut out = link.replace("%f", file).replace("%p", &fsx::file_stem(Path::new(file)));
        for (placeholder, format) in [("%y", "%Y"), ("%m", "%m"), ("%d", "%d")] {
            if !out.contains(placeholder) {
                continue;
            }
            let Some(date) = &self.date else {
                return Err(anyhow!("missing date for permalink: {link}"));
            };
            let value = self.conf.timezone.convert(date).format(format).to_string();
            out = out.replace(placeholder, &value);
        }
        Ok(out)
    }

    /// Front matter `layout` wins, else the nearest `layout.html`.
    fn resolve_layout(&mut self, ctx: &ParseContext) -> Result<()> {
        if !self.layout.is_empty() {
            return Ok(());
        }
        let nearest = ctx
            .layouts
            .iter()
            .filter(|l| {
                l.parent()
                    .is_some_and(|dir| fsx::path_is_in_dir(&self.template_path, dir))
            })
            .max_by_key(|l| l.as_os_str().len())
            .ok_or_else(|| anyhow!("missing layout.html template"))?;
        self.layout = fsx::rel_slash(nearest, &ctx.dirs.template).unwrap_or_default();
        Ok(())
    }

    fn apply_id_policy(&mut self) -> Result<()> {
        let urlpath = self
            .url
            .strip_prefix(self.conf.urlprefix.as_str())
            .unwrap_or(&self.url)
            .to_owned();
        if self.id.as_deref() == Some("urlpath") {
            self.id = Some(urlpath.clone());
        }
        match self.conf.id {
            IdPolicy::Optional => {}
            IdPolicy::Mandatory => {
                if self.id.as_deref().is_none_or(str::is_empty) {
                    return Err(anyhow!("missing document id"));
                }
            }
            IdPolicy::UrlPath => {
                if self.id.is_none() {
                    self.id = Some(urlpath);
                }
            }
        }
        Ok(())
    }

    /// Non-empty id, if any.
    pub fn key_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Fields an index depends on are unchanged (date and tags).
    pub fn same_index_keys(&self, other: &Self) -> bool {
        self.date == other.date && self.tags == other.tags
    }

    pub fn is_rimu(&self) -> bool {
        fsx::ext(&self.content_path) == ".rmu"
    }
}

/// Join slash path segments into a root-relative URL.
pub fn url_join(parts: &[&str]) -> String {
    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        dirs: SiteDirs,
        configs: ConfigSet,
        layouts: Vec<PathBuf>,
    }

    impl Fixture {
        fn new(root_config: &str, files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for sub in ["content", "template"] {
                fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            fs::write(dir.path().join("template/config.toml"), root_config).unwrap();
            fs::write(dir.path().join("template/layout.html"), "{{ body }}").unwrap();
            for (path, text) in files {
                let p = dir.path().join(path);
                fs::create_dir_all(p.parent().unwrap()).unwrap();
                fs::write(p, text).unwrap();
            }
            let dirs = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap();
            let (configs, _) = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap();
            let layouts = walkdir::WalkDir::new(&dirs.template)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_name() == "layout.html")
                .map(|e| e.into_path())
                .collect();
            Self {
                _dir: dir,
                dirs,
                configs,
                layouts,
            }
        }

        fn parse(&self, rel: &str) -> Result<Document> {
            let ctx = ParseContext {
                dirs: &self.dirs,
                configs: &self.configs,
                layouts: &self.layouts,
                drafts: false,
            };
            Document::parse(&self.dirs.content.join(rel), &ctx)
        }
    }

    #[test]
    fn test_title_and_date_from_file_name() {
        let f = Fixture::new(
            "timezone = \"UTC\"",
            &[("content/posts/2024-01-02-hello-world.md", "Hi.")],
        );
        let doc = f.parse("posts/2024-01-02-hello-world.md").unwrap();
        assert_eq!(doc.title, "Hello World");
        assert_eq!(date::rfc3339(doc.date.as_ref()), "2024-01-02T00:00:00+00:00");
        assert_eq!(doc.url, "/posts/2024-01-02-hello-world.html");
        assert_eq!(
            doc.build_path,
            f.dirs.build.join("posts/2024-01-02-hello-world.html")
        );
        assert_eq!(doc.layout, "layout.html");
        assert_eq!(doc.content, "Hi.");
    }

    #[test]
    fn test_front_matter_overrides() {
        let f = Fixture::new(
            "author = \"Default\"",
            &[(
                "content/a.md",
                "---\ntitle: Custom\nauthor: Ann\ntags: [x, y]\ndraft: true\n---\nIntro\n<!--more-->\nRest\n",
            )],
        );
        let doc = f.parse("a.md").unwrap();
        assert_eq!(doc.title, "Custom");
        assert_eq!(doc.author.as_deref(), Some("Ann"));
        assert_eq!(doc.tags, vec!["x", "y"]);
        assert!(doc.draft && doc.unpublished);
        assert_eq!(doc.description, "Intro\n");
        assert_eq!(doc.content, "Intro\nRest\n");
        assert_eq!(doc.date, None);
    }

    #[test]
    fn test_permalink_pretty_url() {
        let f = Fixture::new(
            "permalink = \"/%y/%m/%p/\"\ntimezone = \"UTC\"",
            &[("content/posts/x.md", "---\ndate: 2023-07-15\nslug: post\n---\nBody")],
        );
        let doc = f.parse("posts/x.md").unwrap();
        assert_eq!(doc.build_path, f.dirs.build.join("2023/07/post/index.html"));
        assert_eq!(doc.url, "/2023/07/post/");
    }

    #[test]
    fn test_permalink_file() {
        let f = Fixture::new("", &[("content/p/x.rmu", "+++\npermalink = \"archive/%f\"\n+++\n")]);
        let doc = f.parse("p/x.rmu").unwrap();
        assert_eq!(doc.build_path, f.dirs.build.join("archive/x.html"));
        assert_eq!(doc.url, "/archive/x.html");
        assert!(doc.is_rimu());
    }

    #[test]
    fn test_permalink_without_date() {
        let f = Fixture::new("permalink = \"/%y/%p/\"", &[("content/x.md", "Body")]);
        let err = f.parse("x.md").unwrap_err().to_string();
        assert!(err.ends_with("missing date for permalink: /%y/%p/"), "{err}");
    }

    #[test]
    fn test_nearest_layout() {
        let f = Fixture::new(
            "",
            &[
                ("template/posts/layout.html", "{{ body }}"),
                ("template/postscript/layout.html", "{{ body }}"),
                ("content/posts/deep/a.md", ""),
                ("content/b.md", "---\nlayout: custom.html\n---\n"),
            ],
        );
        assert_eq!(f.parse("posts/deep/a.md").unwrap().layout, "posts/layout.html");
        assert_eq!(f.parse("b.md").unwrap().layout, "custom.html");
    }

    #[test]
    fn test_id_policies() {
        let f = Fixture::new(
            "id = \"urlpath\"\nurlprefix = \"/blog\"",
            &[
                ("content/a.md", ""),
                ("content/b.md", "---\nid: urlpath\n---\n"),
                ("content/c.md", "---\nid: mine\n---\n"),
            ],
        );
        assert_eq!(f.parse("a.md").unwrap().id.as_deref(), Some("/a.html"));
        assert_eq!(f.parse("b.md").unwrap().id.as_deref(), Some("/b.html"));
        assert_eq!(f.parse("c.md").unwrap().id.as_deref(), Some("mine"));

        let f = Fixture::new("id = \"mandatory\"", &[("content/a.md", "")]);
        let err = f.parse("a.md").unwrap_err().to_string();
        assert!(err.ends_with(": missing document id"));
    }

    #[test]
    fn test_front_matter_errors() {
        let f = Fixture::new(
            "",
            &[
                ("content/a.md", "---\ntitle: x\n"),
                ("content/b.md", "---\ndate: yesterday\n---\n"),
            ],
        );
        let err = f.parse("a.md").unwrap_err().to_string();
        assert!(err.ends_with("a.md: front matter: missing closing delimiter: ---"), "{err}");
        let err = f.parse("b.md").unwrap_err().to_string();
        assert!(err.contains("illegal date value: \"yesterday\""), "{err}");
    }

    #[test]
    fn test_url_join() {
        assert_eq!(url_join(&["", "x.html"]), "/x.html");
        assert_eq!(url_join(&["a/b", "c.html"]), "/a/b/c.html");
        assert_eq!(url_join(&["2023/07/post/"]), "/2023/07/post");
    }
}
