//! Incremental rebuilds driven by file change events.
//!
//! | Event             | Template tree | Content document          | Other content file |
//! |-------------------|---------------|---------------------------|--------------------|
//! | `Create`/`Write`  | full build    | add, update or unpublish  | copy or render     |
//! | `Remove`/`Rename` | full build    | delete                    | delete build file  |
//!
//! A document change rebuilds the indexes containing it: fully when its date
//! or tags changed, otherwise only the pages listing it. Documents whose
//! neighbour or tag links moved as a result are re-rendered so the output
//! matches a full build.

use super::Site;
use crate::{
    document::{DocId, is_document_path},
    index::IndexId,
    utils::fsx,
    verbose,
};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Write,
    Remove,
    /// The path was renamed away; the new name arrives as a `Create`.
    Rename,
}

/// A debounced file change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub op: Op,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(op: Op, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }
}

/// Links of a rendered document that depend on other documents.
#[derive(Debug, PartialEq, Eq)]
struct Links {
    prev: Option<String>,
    next: Option<String>,
    tags: Vec<(String, String)>,
}

impl Site {
    /// Apply one change event to the build.
    ///
    /// Returns the URL of the document that was created or updated, for
    /// browser navigation.
    ///
    /// # Panics
    /// If the path is outside the content and template directories.
    pub fn dispatch(&mut self, evt: &ChangeEvent) -> Result<Option<String>> {
        let path = evt.path.as_path();
        if fsx::path_is_in_dir(path, &self.dirs.content) {
            let before = self.homepage_modtime();
            let url = match evt.op {
                Op::Create | Op::Write => self.write_file(path)?,
                Op::Remove | Op::Rename => {
                    self.remove_file(path)?;
                    None
                }
            };
            let home = self.configs.effective_global_config().homepage.as_deref();
            let is_home = self
                .docs
                .by_content_path(path)
                .is_some_and(|id| Some(self.docs.get(id).build_path.as_path()) == home);
            if is_home || self.homepage_modtime() != before {
                self.copy_homepage()?;
            }
            Ok(url)
        } else if fsx::path_is_in_dir(path, &self.dirs.template) {
            verbose!("update"; "template changed: {}", path.display());
            self.build()?;
            Ok(None)
        } else {
            panic!("file is not in watched directories: {}", path.display());
        }
    }

    fn write_file(&mut self, path: &Path) -> Result<Option<String>> {
        if !is_document_path(path) {
            self.build_static_file(path)?;
            return Ok(None);
        }
        let new = self.parse_document(path)?;
        let Some(id) = self.docs.by_content_path(path) else {
            if new.unpublished {
                verbose!("update"; "skip draft: {}", path.display());
                return Ok(None);
            }
            return self.create_document(new).map(Some);
        };
        if new.unpublished {
            verbose!("update"; "skip draft: {}", path.display());
            self.remove_document(id)?;
            return Ok(None);
        }

        let links = self.links();
        let old = self.docs.update(id, new)?;
        let doc = self.docs.get(id);
        if old.build_path != doc.build_path && fsx::file_exists(&old.build_path) {
            verbose!("update"; "delete document: {}", old.build_path.display());
            fs::remove_file(&old.build_path)?;
        }
        let keys_unchanged = old.same_index_keys(doc);
        for ix in self.indexes.containing(doc) {
            if keys_unchanged {
                self.build_index(ix, Some(std::slice::from_ref(&id)))?;
            } else {
                self.rebuild_index(ix)?;
            }
        }
        self.render_document(id)?;
        self.refresh_links(&links, Some(id))?;
        Ok(Some(self.docs.get(id).url.clone()))
    }

    fn create_document(&mut self, doc: crate::document::Document) -> Result<String> {
        let links = self.links();
        let old_files = self.index_files_for(&self.indexes.containing(&doc));
        let id = self.docs.add(doc)?;
        let ixs = self.indexes.add_document(id, self.docs.get_mut(id));
        for ix in ixs {
            self.build_index(ix, None)?;
        }
        self.remove_stale_pages(old_files)?;
        self.render_document(id)?;
        self.refresh_links(&links, Some(id))?;
        Ok(self.docs.get(id).url.clone())
    }

    fn remove_file(&mut self, path: &Path) -> Result<()> {
        if is_document_path(path) {
            // Unknown documents were drafts or failed to parse.
            if let Some(id) = self.docs.by_content_path(path) {
                self.remove_document(id)?;
            }
            return Ok(());
        }
        let dst = fsx::path_translate(path, &self.dirs.content, &self.dirs.build);
        if fsx::file_exists(&dst) {
            verbose!("update"; "delete static: {}", dst.display());
            fs::remove_file(&dst).with_context(|| dst.display().to_string())?;
        }
        Ok(())
    }

    fn remove_document(&mut self, id: DocId) -> Result<()> {
        let links = self.links();
        let ixs = self.indexes.containing(self.docs.get(id));
        let old_files = self.index_files_for(&ixs);
        let doc = self.docs.delete(id);
        for ix in self.indexes.remove_document(id) {
            self.build_index(ix, None)?;
        }
        self.remove_stale_pages(old_files)?;
        if fsx::file_exists(&doc.build_path) {
            verbose!("update"; "delete document: {}", doc.build_path.display());
            fs::remove_file(&doc.build_path)?;
        }
        self.refresh_links(&links, None)
    }

    /// Full index rebuild, deleting pages the new build no longer writes.
    fn rebuild_index(&mut self, ix: IndexId) -> Result<()> {
        let old_files = self.index_files(ix);
        self.build_index(ix, None)?;
        let new_files: BTreeSet<PathBuf> = self.index_files(ix).into_iter().collect();
        for file in old_files {
            if !new_files.contains(&file) && fsx::file_exists(&file) {
                verbose!("update"; "delete index: {}", file.display());
                fs::remove_file(&file)?;
            }
        }
        Ok(())
    }

    fn index_files_for(&self, ixs: &[IndexId]) -> BTreeSet<PathBuf> {
        ixs.iter().flat_map(|&ix| self.index_files(ix)).collect()
    }

    fn remove_stale_pages(&self, old_files: BTreeSet<PathBuf>) -> Result<()> {
        let current: BTreeSet<PathBuf> = self
            .indexes
            .ids()
            .flat_map(|ix| self.index_files(ix))
            .collect();
        for file in old_files.difference(&current) {
            if fsx::file_exists(file) {
                verbose!("update"; "delete index: {}", file.display());
                fs::remove_file(file)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Neighbour refresh
    // ========================================================================

    fn links(&self) -> FxHashMap<DocId, Links> {
        self.docs
            .iter()
            .map(|(id, doc)| {
                let (prev, next) = self.neighbour_urls(id);
                let tags = self.tag_links(doc);
                (id, Links { prev, next, tags })
            })
            .collect()
    }

    /// Re-render documents (and the index pages listing them) whose links
    /// differ from `before`. `skip` has already been rendered.
    fn refresh_links(&mut self, before: &FxHashMap<DocId, Links>, skip: Option<DocId>) -> Result<()> {
        let after = self.links();
        let mut stale: Vec<DocId> = after
            .iter()
            .filter(|(id, links)| Some(**id) != skip && before.get(*id).is_some_and(|b| b != *links))
            .map(|(id, _)| *id)
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        stale.sort();
        for &id in &stale {
            verbose!("update"; "refresh document: {}", self.docs.get(id).content_path.display());
            self.render_document(id)?;
        }
        for ix in self.indexes.ids().collect::<Vec<_>>() {
            let members: Vec<DocId> = stale
                .iter()
                .copied()
                .filter(|id| self.indexes.get(ix).docs.contains(id))
                .collect();
            if !members.is_empty() {
                self.build_index(ix, Some(&members))?;
            }
        }
        Ok(())
    }
}
