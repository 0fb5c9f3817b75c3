//! Full site build.
//!
//! ```text
//! build()
//!     │
//!     ├── parse configs            (missing root config aborts)
//!     ├── parse templates          (*.html, *.txt; init/ skipped)
//!     ├── clear build directory    (unless -keep)
//!     ├── walk content             (documents → registry, static → copy/render)
//!     ├── discover indexes, add documents, render index pages
//!     ├── render documents
//!     ├── copy homepage            (build/index.html)
//!     └── lint                     (-lint)
//! ```
//!
//! Document errors are logged and counted; the walk continues and the
//! aggregate failure is returned at the end so serve mode still has a
//! populated registry.

use super::{BuildError, Site};
use crate::{
    config::ConfigSet,
    document::{Document, Registry, is_document_path},
    index::Indexes,
    log,
    templates::Templates,
    utils::fsx,
    verbose, verbose2,
};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path, time::Instant};
use walkdir::WalkDir;

impl Site {
    /// Rebuild the whole site from the content and template directories.
    pub fn build(&mut self) -> Result<()> {
        let start = Instant::now();
        self.errors = 0;
        self.warnings = 0;

        let (configs, warnings) = ConfigSet::parse_all(&self.dirs, &self.vars)?;
        self.configs = configs;
        self.warnings += warnings;
        self.docs = Registry::new();
        self.indexes = Indexes::default();
        self.templates = Templates::parse_dir(&self.dirs.template, &self.dirs.init)?;

        if self.opts.keep {
            fs::create_dir_all(&self.dirs.build).with_context(|| {
                format!("Failed to create build directory: {}", self.dirs.build.display())
            })?;
        } else {
            fsx::clear_dir(&self.dirs.build)?;
        }

        let (docs_count, static_count) = self.walk_content()?;

        self.indexes = Indexes::discover(&self.dirs, &self.configs)?;
        for id in self.docs.ids() {
            self.indexes.add_document(id, self.docs.get_mut(id));
        }
        for ix in self.indexes.ids().collect::<Vec<_>>() {
            if let Err(e) = self.build_index(ix, None) {
                self.log_error(&e);
            }
        }
        for id in self.docs.ids() {
            if let Err(e) = self.render_document(id) {
                self.log_error(&e);
            }
        }
        self.copy_homepage()?;

        let lint_errors = if self.opts.lint {
            self.lint_and_log()
        } else {
            0
        };

        log!("build"; "documents: {docs_count}");
        log!("build"; "static: {static_count}");
        log!("build"; "time: {:.2}s", start.elapsed().as_secs_f64());
        if self.warnings > 0 {
            log!("warn"; "warnings: {}", self.warnings);
        }
        if self.errors > 0 {
            log!("error"; "errors: {}", self.errors);
            return Err(BuildError::Documents(self.errors).into());
        }
        if lint_errors > 0 {
            return Err(BuildError::Lint(lint_errors).into());
        }
        Ok(())
    }

    /// Parse documents and build static files in content tree order.
    /// Returns the document and static file counts.
    fn walk_content(&mut self) -> Result<(usize, usize)> {
        let (mut docs_count, mut static_count) = (0, 0);
        let content_dir = self.dirs.content.clone();
        let configs = &self.configs;
        let walker = WalkDir::new(&content_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let keep = e.depth() == 0 || !configs.exclude(e.path());
                if !keep {
                    verbose!("build"; "exclude: {}", e.path().display());
                }
                keep
            });
        let entries: Vec<_> = walker.collect::<Result<_, _>>()?;
        for entry in entries {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if is_document_path(path) {
                docs_count += 1;
                match self.parse_document(path) {
                    Ok(doc) if doc.unpublished => {
                        verbose!("build"; "skip draft: {}", path.display());
                    }
                    Ok(doc) => {
                        if let Err(e) = self.docs.add(doc) {
                            self.log_error(&anyhow::Error::from(e));
                        }
                    }
                    Err(e) => self.log_error(&e),
                }
            } else {
                static_count += 1;
                if let Err(e) = self.build_static_file(path) {
                    self.log_error(&e);
                }
            }
        }
        Ok((docs_count, static_count))
    }

    /// Copy a static content file to the build directory, or render it as a
    /// text template when it matches `templates`.
    pub(super) fn build_static_file(&self, path: &Path) -> Result<()> {
        let conf = self.configs.config_for(path);
        if self.configs.matches(path, &conf.templates) {
            return self.render_static_file(path);
        }
        let dst = fsx::path_translate(path, &self.dirs.content, &self.dirs.build);
        verbose!("build"; "copy static: {}", path.display());
        fsx::copy_file(path, &dst)?;
        verbose2!("build"; "write static: {}", dst.display());
        Ok(())
    }

    fn render_static_file(&self, path: &Path) -> Result<()> {
        let doc = Document::parse_static(path, &self.parse_context())?;
        verbose2!("build"; "render static: {}", path.display());
        let mut content = doc.content.clone();
        if self.configs.matches(&doc.content_path, &doc.templates) {
            let data = self.document_data(&doc, None)?;
            content = self
                .templates
                .render_text("staticFile", &content, &data)
                .with_context(|| path.display().to_string())?;
        }
        verbose!("build"; "write static: {}", doc.build_path.display());
        fsx::write_text(&doc.build_path, &content)
    }

    /// Copy the `homepage` build file to `build/index.html` and alias it in
    /// the registry.
    pub(super) fn copy_homepage(&mut self) -> Result<()> {
        let Some(home) = self.configs.effective_global_config().homepage.clone() else {
            return Ok(());
        };
        if !fsx::file_exists(&home) {
            bail!("homepage file missing: \"{}\"", home.display());
        }
        let dst = self.dirs.build.join("index.html");
        if home != dst {
            verbose2!("build"; "copy homepage: {}", home.display());
            verbose!("build"; "write homepage: {}", dst.display());
            fsx::copy_file(&home, &dst)?;
        }
        if let Some(id) = self.docs.by_build_path(&home) {
            self.docs.alias(&dst, id);
        }
        Ok(())
    }

    /// Modification time of the homepage file, if configured and present.
    pub(super) fn homepage_modtime(&self) -> Option<chrono::DateTime<chrono::Local>> {
        let home = self.configs.effective_global_config().homepage.as_ref()?;
        fsx::mod_time(home).ok()
    }
}
