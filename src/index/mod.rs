//! Document indexes.
//!
//! A template directory containing `docs.html` defines an index over the
//! mirrored content subtree. `tags.html` alongside it adds per-tag pages.
//!
//! ```text
//! template/posts/docs.html  ─┐
//! template/posts/tags.html  ─┼─ index over content/posts/**
//!                            └─ pages in build/indexes/posts/
//!                                 docs-1.html, docs-2.html, ...
//!                                 tags.html
//!                                 tags/<slug>-1.html, ...
//! ```
//!
//! An index is primary when no ancestor directory is also an index. A
//! document's primary index owns its prev/next links.

mod page;

pub use page::{Page, paginate};

use crate::{
    config::{ConfigSet, SiteDirs},
    document::{DocId, Document, Registry},
    utils::{fsx, slug},
};
use anyhow::{Result, bail};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    path::PathBuf,
};
use walkdir::WalkDir;

pub const DOCS_TEMPLATE: &str = "docs.html";
pub const TAGS_TEMPLATE: &str = "tags.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(usize);

#[derive(Debug, Clone)]
pub struct Index {
    pub content_dir: PathBuf,
    pub template_dir: PathBuf,
    /// Where the index pages are written (under `build/indexes`).
    pub build_dir: PathBuf,
    /// Build-relative URL path of `build_dir`, without leading `/`.
    pub url: String,
    pub conf: crate::config::Config,
    /// Template name of `docs.html`.
    pub docs_template: String,
    /// Template name of `tags.html` when the index has tags.
    pub tags_template: Option<String>,
    /// Sorted by date, newest first.
    pub docs: Vec<DocId>,
    pub tag_docs: BTreeMap<String, Vec<DocId>>,
    pub slugs: BTreeMap<String, String>,
    pub is_primary: bool,
}

#[derive(Debug, Default)]
pub struct Indexes {
    list: Vec<Index>,
}

impl Indexes {
    /// Find every indexed directory in the template tree.
    pub fn discover(dirs: &SiteDirs, configs: &ConfigSet) -> Result<Self> {
        let mut list = Vec::new();
        let walker = WalkDir::new(&dirs.template)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != dirs.init.as_path());
        for entry in walker {
            let entry = entry?;
            let dir = entry.path();
            if !entry.file_type().is_dir() || !fsx::file_exists(&dir.join(DOCS_TEMPLATE)) {
                continue;
            }
            let content_dir = fsx::path_translate(dir, &dirs.template, &dirs.content);
            if !fsx::dir_exists(&content_dir) {
                bail!(
                    "missing indexed content directory: \"{}\"",
                    content_dir.display()
                );
            }
            let build_dir = fsx::path_translate(dir, &dirs.template, &dirs.indexes);
            let url = fsx::rel_slash(&build_dir, &dirs.build).unwrap_or_default();
            let name = |file: &str| {
                fsx::rel_slash(&dir.join(file), &dirs.template).unwrap_or_default()
            };
            let tags_template = fsx::file_exists(&dir.join(TAGS_TEMPLATE))
                .then(|| name(TAGS_TEMPLATE));
            crate::verbose2!("index"; "discovered index: {}", dir.display());
            list.push(Index {
                conf: configs.config_for(&content_dir),
                docs_template: name(DOCS_TEMPLATE),
                tags_template,
                content_dir,
                template_dir: dir.to_path_buf(),
                build_dir,
                url,
                docs: Vec::new(),
                tag_docs: BTreeMap::new(),
                slugs: BTreeMap::new(),
                is_primary: true,
            });
        }
        let dirs: Vec<PathBuf> = list.iter().map(|i| i.template_dir.clone()).collect();
        for idx in &mut list {
            idx.is_primary = !dirs
                .iter()
                .any(|d| *d != idx.template_dir && fsx::path_is_in_dir(&idx.template_dir, d));
        }
        Ok(Self { list })
    }

    /// Indexes whose template directory contains the document.
    pub fn containing(&self, doc: &Document) -> Vec<IndexId> {
        self.list
            .iter()
            .enumerate()
            .filter(|(_, idx)| fsx::path_is_in_dir(&doc.content_path, &idx.content_dir))
            .map(|(i, _)| IndexId(i))
            .collect()
    }

    /// Add a document to every index containing it and assign its primary
    /// index. Returns the indexes it was added to.
    pub fn add_document(&mut self, id: DocId, doc: &mut Document) -> Vec<IndexId> {
        let ids = self.containing(doc);
        doc.primary_index = None;
        for &ix in &ids {
            let idx = &mut self.list[ix.0];
            idx.docs.push(id);
            if idx.is_primary {
                doc.primary_index = Some(ix);
            }
        }
        ids
    }

    /// Remove a document from every index list. Returns the indexes it was in.
    pub fn remove_document(&mut self, id: DocId) -> Vec<IndexId> {
        let mut found = Vec::new();
        for (i, idx) in self.list.iter_mut().enumerate() {
            if let Some(pos) = idx.docs.iter().position(|d| *d == id) {
                idx.docs.remove(pos);
                for docs in idx.tag_docs.values_mut() {
                    docs.retain(|d| *d != id);
                }
                found.push(IndexId(i));
            }
        }
        found
    }

    /// Previous (newer) and next (older) neighbours of a document in its
    /// primary index.
    pub fn neighbours(&self, id: DocId, doc: &Document) -> (Option<DocId>, Option<DocId>) {
        let Some(primary) = doc.primary_index else {
            return (None, None);
        };
        let docs = &self.get(primary).docs;
        let Some(pos) = docs.iter().position(|d| *d == id) else {
            return (None, None);
        };
        let prev = pos.checked_sub(1).map(|p| docs[p]);
        let next = docs.get(pos + 1).copied();
        (prev, next)
    }

    pub fn get(&self, id: IndexId) -> &Index {
        &self.list[id.0]
    }

    pub fn get_mut(&mut self, id: IndexId) -> &mut Index {
        &mut self.list[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = IndexId> + use<> {
        (0..self.list.len()).map(IndexId)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.list.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.list.len()
    }
}

impl Index {
    /// Sort documents newest first. Undated documents go last; ties keep
    /// content-tree walk order.
    pub fn sort(&mut self, reg: &Registry) {
        self.docs.sort_by(|a, b| {
            let (a, b) = (reg.get(*a), reg.get(*b));
            let by_date = match (&a.date, &b.date) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_date.then_with(|| a.content_path.cmp(&b.content_path))
        });
    }

    /// Rebuild the tag partition and tag slugs from `docs`.
    pub fn partition_tags(&mut self, reg: &Registry) {
        self.tag_docs.clear();
        self.slugs.clear();
        if self.tags_template.is_none() {
            return;
        }
        for &id in &self.docs {
            for tag in &reg.get(id).tags {
                let docs = self.tag_docs.entry(tag.clone()).or_default();
                if docs.last() != Some(&id) {
                    docs.push(id);
                }
            }
        }
        let mut taken: Vec<String> = Vec::new();
        for tag in self.tag_docs.keys() {
            let slug = slug::slugify(tag, taken.iter().map(String::as_str));
            taken.push(slug.clone());
            self.slugs.insert(tag.clone(), slug);
        }
    }

    /// Root-relative URL of the first page of a tag.
    pub fn tag_url(&self, tag: &str) -> Option<String> {
        let slug = self.slugs.get(tag)?;
        Some(crate::document::url_join(&[
            &self.url,
            "tags",
            &format!("{slug}-1.html"),
        ]))
    }

    /// Document list pages.
    pub fn doc_pages(&self) -> Vec<Page> {
        paginate(&self.docs, self.conf.paginate, &self.build_dir, &self.url, |n| {
            format!("docs-{n}.html")
        })
    }

    /// Pages of one tag.
    pub fn tag_pages(&self, tag: &str) -> Vec<Page> {
        let slug = self.slugs.get(tag).map(String::as_str).unwrap_or_default();
        let docs = self.tag_docs.get(tag).map(Vec::as_slice).unwrap_or_default();
        paginate(docs, self.conf.paginate, &self.build_dir, &self.url, |n| {
            format!("tags/{slug}-{n}.html")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RawConfig, document::test_doc, utils::date::parse_date};
    use std::{fs, path::Path};
    use tempfile::TempDir;

    fn site(files: &[&str]) -> (TempDir, SiteDirs, ConfigSet) {
        let dir = TempDir::new().unwrap();
        for sub in ["content", "template"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        fs::write(dir.path().join("template/config.toml"), "").unwrap();
        for f in files {
            let p = dir.path().join(f);
            if f.ends_with('/') {
                fs::create_dir_all(p).unwrap();
            } else {
                fs::create_dir_all(p.parent().unwrap()).unwrap();
                fs::write(p, "").unwrap();
            }
        }
        let dirs = SiteDirs::resolve(Some(dir.path()), None, None, None, false).unwrap();
        let (configs, _) = ConfigSet::parse_all(&dirs, &RawConfig::default()).unwrap();
        (dir, dirs, configs)
    }

    #[test]
    fn test_discover() {
        let (_d, dirs, configs) = site(&[
            "template/docs.html",
            "template/posts/docs.html",
            "template/posts/tags.html",
            "template/init/docs.html",
            "content/posts/",
        ]);
        let idxs = Indexes::discover(&dirs, &configs).unwrap();
        assert_eq!(idxs.len(), 2);
        let root = idxs.iter().next().unwrap();
        assert_eq!(root.url, "indexes");
        assert!(root.is_primary);
        assert!(root.tags_template.is_none());
        let posts = idxs.iter().nth(1).unwrap();
        assert_eq!(posts.url, "indexes/posts");
        assert_eq!(posts.build_dir, dirs.indexes.join("posts"));
        assert_eq!(posts.docs_template, "posts/docs.html");
        assert_eq!(posts.tags_template.as_deref(), Some("posts/tags.html"));
        assert!(!posts.is_primary);
    }

    #[test]
    fn test_missing_content_dir() {
        let (_d, dirs, configs) = site(&["template/posts/docs.html"]);
        let err = Indexes::discover(&dirs, &configs).unwrap_err();
        assert!(err.to_string().starts_with("missing indexed content directory"));
    }

    #[test]
    fn test_membership_sort_and_tags() {
        let (_d, dirs, configs) = site(&[
            "template/posts/docs.html",
            "template/posts/tags.html",
            "content/posts/",
        ]);
        let mut idxs = Indexes::discover(&dirs, &configs).unwrap();
        let mut reg = Registry::new();
        let tz: crate::utils::date::TimeZone = "UTC".parse().unwrap();
        let specs = [
            ("a.md", Some("2024-01-01"), vec!["Go", "rust"]),
            ("b.md", None, vec!["go"]),
            ("c.md", Some("2024-03-01"), vec!["rust", "rust"]),
            ("d.md", Some("2024-01-01"), vec![]),
        ];
        let mut ids = Vec::new();
        for (name, date, tags) in specs {
            let mut doc = test_doc(
                dirs.content.join("posts").join(name).to_str().unwrap(),
                dirs.build.join(name).to_str().unwrap(),
                None,
            );
            doc.template_path = dirs.template.join("posts").join(name);
            doc.date = date.map(|d| parse_date(d, tz).unwrap());
            doc.tags = tags.into_iter().map(String::from).collect();
            let id = reg.add(doc.clone()).unwrap();
            let added = idxs.add_document(id, reg.get_mut(id));
            assert_eq!(added.len(), 1);
            ids.push(id);
        }
        let ix = idxs.ids().next().unwrap();
        let idx = idxs.get_mut(ix);
        idx.sort(&reg);
        assert_eq!(idx.docs, vec![ids[2], ids[0], ids[3], ids[1]]);

        idx.partition_tags(&reg);
        assert_eq!(idx.tag_docs["rust"], vec![ids[2], ids[0]]);
        assert_eq!(idx.tag_docs["go"], vec![ids[1]]);
        assert_eq!(idx.slugs["Go"], "go");
        assert_eq!(idx.slugs["go"], "go-2");
        assert_eq!(idx.tag_url("go").as_deref(), Some("/indexes/posts/tags/go-2-1.html"));

        let (prev, next) = idxs.neighbours(ids[0], reg.get(ids[0]));
        assert_eq!((prev, next), (Some(ids[2]), Some(ids[3])));

        assert_eq!(idxs.remove_document(ids[0]), vec![ix]);
        assert_eq!(idxs.get(ix).tag_docs["rust"], vec![ids[2]]);
        assert!(Path::new(&idxs.get(ix).build_dir).ends_with("indexes/posts"));
    }
}
