//! Document registry with lookup by content path, build path and id.
//!
//! Documents live in a slab addressed by [`DocId`]; ids are never reused,
//! so iteration in id order is insertion order.

use super::Document;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stable handle to a registered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{}: duplicate document build path in: {}", .new.display(), .existing.display())]
    DuplicateBuildPath { new: PathBuf, existing: PathBuf },

    #[error("{}: duplicate document id in: {}", .new.display(), .existing.display())]
    DuplicateId { new: PathBuf, existing: PathBuf },
}

#[derive(Debug, Default)]
pub struct Registry {
    docs: Vec<Option<Document>>,
    by_content_path: FxHashMap<PathBuf, DocId>,
    by_build_path: FxHashMap<PathBuf, DocId>,
    by_id: FxHashMap<String, DocId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document.
    ///
    /// # Panics
    /// If a document with the same content path is already registered.
    pub fn add(&mut self, doc: Document) -> Result<DocId, RegistryError> {
        self.check(&doc, None)?;
        let id = DocId(self.docs.len());
        self.install(id, &doc);
        self.docs.push(Some(doc));
        Ok(id)
    }

    /// Remove a document and any build path aliases pointing at it.
    ///
    /// # Panics
    /// If the lookup maps disagree about the document.
    pub fn delete(&mut self, id: DocId) -> Document {
        let doc = self
            .docs
            .get_mut(id.0)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("corrupt document registry: missing {id:?}"));
        self.uninstall(id, &doc);
        doc
    }

    /// Replace a registered document with a freshly parsed one, keeping its
    /// [`DocId`] and primary index. On a collision the previous record is
    /// restored and the error returned.
    ///
    /// Returns the previous record.
    pub fn update(&mut self, id: DocId, mut new: Document) -> Result<Document, RegistryError> {
        let aliases = self.aliases(id);
        let old = self.delete(id);
        if let Err(e) = self.check(&new, Some(&old.content_path)) {
            self.install(id, &old);
            for path in aliases {
                self.by_build_path.insert(path, id);
            }
            self.docs[id.0] = Some(old);
            return Err(e);
        }
        new.primary_index = old.primary_index;
        self.install(id, &new);
        self.docs[id.0] = Some(new);
        Ok(old)
    }

    /// Make `build_path` resolve to document `id` (used for the homepage copy).
    pub fn alias(&mut self, build_path: &Path, id: DocId) {
        self.by_build_path.insert(build_path.to_path_buf(), id);
    }

    /// Build paths other than its own that resolve to document `id`.
    fn aliases(&self, id: DocId) -> Vec<PathBuf> {
        let own = &self.get(id).build_path;
        self.by_build_path
            .iter()
            .filter(|&(path, &v)| v == id && path != own)
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn check(&self, doc: &Document, replacing: Option<&Path>) -> Result<(), RegistryError> {
        if let Some(&other) = self.by_build_path.get(&doc.build_path) {
            return Err(RegistryError::DuplicateBuildPath {
                new: doc.content_path.clone(),
                existing: self.get(other).content_path.clone(),
            });
        }
        if replacing != Some(doc.content_path.as_path())
            && self.by_content_path.contains_key(&doc.content_path)
        {
            panic!(
                "{}: registry already contains this document",
                doc.content_path.display()
            );
        }
        if let Some(key) = doc.key_id()
            && let Some(&other) = self.by_id.get(key)
        {
            return Err(RegistryError::DuplicateId {
                new: doc.content_path.clone(),
                existing: self.get(other).content_path.clone(),
            });
        }
        Ok(())
    }

    fn install(&mut self, id: DocId, doc: &Document) {
        self.by_build_path.insert(doc.build_path.clone(), id);
        self.by_content_path.insert(doc.content_path.clone(), id);
        if let Some(key) = doc.key_id() {
            self.by_id.insert(key.to_owned(), id);
        }
    }

    fn uninstall(&mut self, id: DocId, doc: &Document) {
        fn remove<K: std::hash::Hash + Eq + std::fmt::Debug>(
            map: &mut FxHashMap<K, DocId>,
            key: &K,
            id: DocId,
        ) {
            match map.remove(key) {
                Some(found) if found == id => {}
                _ => panic!("corrupt document registry: {key:?}"),
            }
        }
        remove(&mut self.by_build_path, &doc.build_path, id);
        remove(&mut self.by_content_path, &doc.content_path, id);
        if let Some(key) = doc.key_id() {
            remove(&mut self.by_id, &key.to_owned(), id);
        }
        self.by_build_path.retain(|_, v| *v != id);
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// # Panics
    /// If `id` has been deleted.
    pub fn get(&self, id: DocId) -> &Document {
        self.docs[id.0]
            .as_ref()
            .unwrap_or_else(|| panic!("stale document id: {id:?}"))
    }

    /// # Panics
    /// If `id` has been deleted.
    pub fn get_mut(&mut self, id: DocId) -> &mut Document {
        self.docs[id.0]
            .as_mut()
            .unwrap_or_else(|| panic!("stale document id: {id:?}"))
    }

    pub fn by_content_path(&self, path: &Path) -> Option<DocId> {
        self.by_content_path.get(path).copied()
    }

    pub fn by_build_path(&self, path: &Path) -> Option<DocId> {
        self.by_build_path.get(path).copied()
    }

    pub fn by_id(&self, id: &str) -> Option<DocId> {
        self.by_id.get(id).copied()
    }

    /// Registered documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.docs
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.as_ref().map(|d| (DocId(i), d)))
    }

    pub fn ids(&self) -> Vec<DocId> {
        self.iter().map(|(id, _)| id).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_content_path.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_content_path.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Local;
    use std::collections::BTreeMap;

    /// Minimal document for registry and index tests.
    pub(crate) fn doc(content: &str, build: &str, id: Option<&str>) -> Document {
        Document {
            content_path: PathBuf::from(content),
            build_path: PathBuf::from(build),
            template_path: PathBuf::new(),
            url: String::new(),
            id: id.map(str::to_owned),
            conf: Config::default(),
            title: content.to_owned(),
            date: None,
            modtime: Local::now(),
            author: None,
            description: String::new(),
            tags: Vec::new(),
            draft: false,
            permalink: String::new(),
            slug: String::new(),
            layout: String::new(),
            templates: Default::default(),
            user: BTreeMap::new(),
            content: String::new(),
            ids: Vec::new(),
            urls: Vec::new(),
            primary_index: None,
            unpublished: false,
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("a"))).unwrap();
        assert_eq!(reg.by_content_path(Path::new("/c/a.md")), Some(a));
        assert_eq!(reg.by_build_path(Path::new("/b/a.html")), Some(a));
        assert_eq!(reg.by_id("a"), Some(a));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_duplicate_build_path() {
        let mut reg = Registry::new();
        reg.add(doc("/c/a.md", "/b/x.html", None)).unwrap();
        let err = reg.add(doc("/c/b.md", "/b/x.html", None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/c/b.md: duplicate document build path in: /c/a.md"
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_duplicate_id() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("same"))).unwrap();
        let err = reg.add(doc("/c/b.md", "/b/b.html", Some("same"))).unwrap_err();
        assert_eq!(err.to_string(), "/c/b.md: duplicate document id in: /c/a.md");
        assert_eq!(reg.by_id("same"), Some(a));
        assert_eq!(reg.by_content_path(Path::new("/c/b.md")), None);
        // Empty ids never collide.
        reg.add(doc("/c/c.md", "/b/c.html", Some(""))).unwrap();
        reg.add(doc("/c/d.md", "/b/d.html", Some(""))).unwrap();
    }

    #[test]
    #[should_panic(expected = "registry already contains this document")]
    fn test_duplicate_content_path_panics() {
        let mut reg = Registry::new();
        reg.add(doc("/c/a.md", "/b/a.html", None)).unwrap();
        let _ = reg.add(doc("/c/a.md", "/b/other.html", None));
    }

    #[test]
    fn test_delete_removes_aliases() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("a"))).unwrap();
        reg.alias(Path::new("/b/index.html"), a);
        assert_eq!(reg.by_build_path(Path::new("/b/index.html")), Some(a));
        let removed = reg.delete(a);
        assert_eq!(removed.content_path, PathBuf::from("/c/a.md"));
        assert!(reg.is_empty());
        assert_eq!(reg.by_build_path(Path::new("/b/index.html")), None);
        assert_eq!(reg.by_id("a"), None);
    }

    #[test]
    fn test_update_success() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("a"))).unwrap();
        let old = reg
            .update(a, doc("/c/a.md", "/b/renamed.html", Some("a2")))
            .unwrap();
        assert_eq!(old.build_path, PathBuf::from("/b/a.html"));
        assert_eq!(reg.by_build_path(Path::new("/b/renamed.html")), Some(a));
        assert_eq!(reg.by_build_path(Path::new("/b/a.html")), None);
        assert_eq!(reg.by_id("a2"), Some(a));
        assert_eq!(reg.by_id("a"), None);
    }

    #[test]
    fn test_update_collision_restores() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("a"))).unwrap();
        reg.add(doc("/c/b.md", "/b/b.html", Some("b"))).unwrap();
        let err = reg
            .update(a, doc("/c/a.md", "/b/a.html", Some("b")))
            .unwrap_err();
        assert_eq!(err.to_string(), "/c/a.md: duplicate document id in: /c/b.md");
        assert_eq!(reg.by_id("a"), Some(a));
        assert_eq!(reg.get(a).id.as_deref(), Some("a"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_update_collision_keeps_alias() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/a.md", "/b/a.html", Some("a"))).unwrap();
        reg.add(doc("/c/b.md", "/b/b.html", Some("b"))).unwrap();
        reg.alias(Path::new("/b/index.html"), a);
        reg.update(a, doc("/c/a.md", "/b/a.html", Some("b")))
            .unwrap_err();
        assert_eq!(reg.by_build_path(Path::new("/b/index.html")), Some(a));
        assert_eq!(reg.by_build_path(Path::new("/b/a.html")), Some(a));
    }

    #[test]
    fn test_iteration_order() {
        let mut reg = Registry::new();
        let a = reg.add(doc("/c/z.md", "/b/z.html", None)).unwrap();
        let b = reg.add(doc("/c/a.md", "/b/a.html", None)).unwrap();
        let c = reg.add(doc("/c/m.md", "/b/m.html", None)).unwrap();
        reg.delete(b);
        assert_eq!(reg.ids(), vec![a, c]);
    }
}
