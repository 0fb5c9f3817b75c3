//! The build engine.
//!
//! [`Site`] owns every piece of build state: the configuration cascade, the
//! compiled templates, the document registry and the indexes. Full builds
//! recreate all of it; incremental updates mutate it in place.
//!
//! ```text
//! build()                      dispatch(ChangeEvent)
//!   configs ← parse_all          template tree → build()
//!   templates ← parse_dir        content tree  → create / write / remove
//!   docs ← walk content                           ├─ registry add/update/delete
//!   indexes ← discover + add                      ├─ index rebuild (full|partial)
//!   render indexes, documents                     ├─ render document
//!   homepage, lint                                └─ refresh stale neighbours
//! ```

mod build;
mod lint;
mod render;
mod update;


pub use update::{ChangeEvent, Op};

use crate::{
    config::{ConfigSet, RawConfig, SiteDirs},
    document::{Document, ParseContext, Registry},
    index::Indexes,
    log,
    templates::Templates,
};
use anyhow::Result;
use std::path::Path;
use thiserror::Error;

/// Aggregate build failures. Details have already been logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("document errors: {0}")]
    Documents(usize),

    #[error("lint errors: {0}")]
    Lint(usize),
}

/// Command options that affect building.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Publish draft documents.
    pub drafts: bool,
    /// Validate links and element ids after building.
    pub lint: bool,
    /// Do not clear the build directory first.
    pub keep: bool,
}

pub struct Site {
    pub dirs: SiteDirs,
    /// `-var`/`-config` overrides for the root configuration.
    pub vars: RawConfig,
    pub opts: BuildOptions,
    pub(crate) configs: ConfigSet,
    templates: Templates,
    pub(crate) docs: Registry,
    pub(crate) indexes: Indexes,
    errors: usize,
    warnings: usize,
}

impl Site {
    pub fn new(dirs: SiteDirs, vars: RawConfig, opts: BuildOptions) -> Self {
        Self {
            dirs,
            vars,
            opts,
            configs: ConfigSet::default(),
            templates: Templates::new(),
            docs: Registry::new(),
            indexes: Indexes::default(),
            errors: 0,
            warnings: 0,
        }
    }

    pub fn configs(&self) -> &ConfigSet {
        &self.configs
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Parse a content document against the current build state.
    fn parse_document(&self, path: &Path) -> Result<Document> {
        Document::parse(path, &self.parse_context())
    }

    fn parse_context(&self) -> ParseContext<'_> {
        ParseContext {
            dirs: &self.dirs,
            configs: &self.configs,
            layouts: self.templates.layouts(),
            drafts: self.opts.drafts,
        }
    }

    fn log_error(&mut self, err: &anyhow::Error) {
        log!("error"; "{}", self.dirs.shorten(&format!("{err:#}")));
        self.errors += 1;
    }
}
