//! Site initialization.
//!
//! ```text
//! -from DIR ──copy──▶ template/          (only when empty or missing)
//!                     ├── posts/     ──mkdir──▶ content/posts/
//!                     └── init/*     ──copy───▶ content/*
//! ```

use crate::{config::SiteDirs, log, utils::fsx, verbose};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Populate empty template and content directories from `from`.
pub fn init_site(dirs: &SiteDirs, from: Option<&Path>) -> Result<()> {
    let Some(from) = from else {
        bail!("missing -from template directory");
    };
    let from = fsx::absolute(from)?;
    if !fsx::dir_exists(&from) {
        bail!("missing -from directory: {}", from.display());
    }

    if fsx::dir_count(&dirs.template) == 0 {
        if fsx::path_is_in_dir(&from, &dirs.template) {
            bail!("-from directory cannot reside inside the template directory");
        }
        verbose!("init"; "copy templates: {} → {}", from.display(), dirs.template.display());
        fsx::copy_dir(&from, &dirs.template)?;
    } else {
        log!("warn"; "skipping non-empty target template directory: {}", dirs.template.display());
    }

    if fsx::dir_count(&dirs.content) == 0 {
        init_content_structure(dirs)?;
        if fsx::dir_exists(&dirs.init) {
            verbose!("init"; "copy init: {}", dirs.init.display());
            fsx::copy_dir(&dirs.init, &dirs.content)?;
        }
    } else {
        log!("warn"; "skipping non-empty target content directory: {}", dirs.content.display());
    }
    Ok(())
}

/// Mirror the template directory tree, minus `init`, into the content directory.
fn init_content_structure(dirs: &SiteDirs) -> Result<()> {
    fs::create_dir_all(&dirs.content)
        .with_context(|| format!("Failed to create {}", dirs.content.display()))?;
    let walker = WalkDir::new(&dirs.template)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != dirs.init);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dst = fsx::path_translate(entry.path(), &dirs.template, &dirs.content);
        verbose!("init"; "make directory: {}", dst.display());
        fs::create_dir_all(&dst).with_context(|| format!("Failed to create {}", dst.display()))?;
    }
    Ok(())
}
