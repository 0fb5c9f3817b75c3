//! The `new` command: create a content document from a template.
//!
//! The document text comes from the first of:
//!
//! 1. the `-from FILE` option
//! 2. the closest `new.md` walking up the template path that mirrors the
//!    document's directory
//! 3. a built-in default
//!
//! and is rendered with `title` and `date` derived from the file name.

use crate::{
    config::{ConfigSet, RawConfig, SiteDirs},
    templates::{Data, Templates},
    utils::{date, fsx, slug},
    verbose, verbose2,
};
use anyhow::{Result, anyhow, bail};
use chrono::Local;
use minijinja::Value;
use std::path::{Path, PathBuf};

const NEW_TEMPLATE: &str = "new.md";

const DEFAULT_TEMPLATE: &str = "---
title: {{ title }}
date:  {{ date }}
draft: true
---

Document content goes here.
";

/// Write a new document to `doc`.
pub fn new_document(
    dirs: &SiteDirs,
    vars: &RawConfig,
    doc: &Path,
    from: Option<&Path>,
) -> Result<()> {
    let doc = fsx::absolute(doc)?;
    if fsx::dir_exists(&doc) {
        bail!("document is a directory: {}", doc.display());
    }
    if let Some(dir) = doc.parent()
        && !fsx::dir_exists(dir)
    {
        bail!("missing document directory: {}", dir.display());
    }
    if doc.exists() {
        bail!("document already exists: {}", doc.display());
    }
    if !fsx::path_is_in_dir(&doc, &dirs.content) {
        bail!("document must reside in content directory: {}", dirs.content.display());
    }

    let (configs, _) = ConfigSet::parse_all(dirs, vars)?;
    let conf = configs.config_for(&doc);
    let stem = fsx::file_stem(&doc);
    let (file_date, title) = slug::extract_date_title(&stem);
    let when = match file_date {
        Some(d) => date::parse_date(d, conf.timezone).map_err(|e| anyhow!(e))?,
        None => conf.timezone.convert(&Local::now().fixed_offset()),
    };
    let mut data = Data::new();
    data.insert("title", Value::from(title));
    data.insert("date", Value::from(date::rfc3339(Some(&when))));
    verbose!("new"; "document title: {}", data["title"]);
    verbose!("new"; "document date: {}", data["date"]);

    let text = match from {
        Some(f) => {
            verbose!("new"; "document template: {}", f.display());
            fsx::read_text(f)?
        }
        None => match find_template(dirs, &doc) {
            Some(f) => {
                verbose!("new"; "document template: {}", f.display());
                fsx::read_text(&f)?
            }
            None => DEFAULT_TEMPLATE.to_owned(),
        },
    };
    let text = Templates::new().render_text(NEW_TEMPLATE, &text, &data)?;
    verbose2!("new"; "document text: {text:?}");
    verbose!("new"; "document file: {}", doc.display());
    fsx::write_text(&doc, &text)
}

/// Closest `new.md` between the document's mirrored template directory and
/// the template root.
fn find_template(dirs: &SiteDirs, doc: &Path) -> Option<PathBuf> {
    let start = doc.parent()?;
    let mut dir = fsx::path_translate(start, &dirs.content, &dirs.template);
    loop {
        let file = dir.join(NEW_TEMPLATE);
        if fsx::file_exists(&file) {
            return Some(file);
        }
        if dir == dirs.template || !dir.pop() {
            return None;
        }
    }
}
