//! Template data assembly and page rendering.
//!
//! # Document data
//!
//! | Key                     | Value                                        |
//! |-------------------------|----------------------------------------------|
//! | `title` `author` `id`   | strings (empty when unset)                   |
//! | `date` `modtime`        | RFC 3339 (empty when unset)                  |
//! | `shortdate` ...         | `date` formatted in the document's timezone  |
//! | `url` `slug` `layout`   | strings                                      |
//! | `tags`                  | `[{tag, url}]`, `url` empty without tag pages |
//! | `prev` `next`           | `{url}` in the primary index, else none      |
//! | `user`                  | configuration `user` overlaid by the document |
//! | `description`           | rendered HTML                                |
//! | `body`                  | rendered HTML (layout only)                  |
//!
//! # Index page data
//!
//! `docs`, `count`, `page` (`number url prev next first last`), `urlprefix`,
//! `user` and, on tag pages, `tag`.

use super::Site;
use crate::{
    document::{DocId, Document},
    index::{IndexId, Page},
    markup::{Markup, RIMU_PRELUDE},
    templates::{Data, int, none},
    utils::{date, fsx, html},
    verbose, verbose2,
};
use anyhow::{Context, Result};
use minijinja::Value;
use std::{collections::BTreeMap, fs, path::PathBuf};

impl Site {
    /// Template data for a document. `id` is set for registered documents and
    /// supplies the prev/next links.
    pub(super) fn document_data(&self, doc: &Document, id: Option<DocId>) -> Result<Data> {
        let mut data = Data::new();
        let s = |v: &str| Value::from(v);
        data.insert("title", s(&doc.title));
        data.insert("author", s(doc.author.as_deref().unwrap_or_default()));
        data.insert("id", s(doc.id.as_deref().unwrap_or_default()));
        data.insert("templates", s(&doc.templates.to_string()));
        data.insert("permalink", s(&doc.permalink));
        data.insert("shortdate", s(&doc.conf.shortdate(doc.date.as_ref())));
        data.insert("mediumdate", s(&doc.conf.mediumdate(doc.date.as_ref())));
        data.insert("longdate", s(&doc.conf.longdate(doc.date.as_ref())));
        data.insert("date", s(&date::rfc3339(doc.date.as_ref())));
        data.insert("modtime", s(&date::rfc3339(Some(&doc.modtime.fixed_offset()))));
        data.insert("layout", s(&doc.layout));
        data.insert("urlprefix", s(&doc.conf.urlprefix));
        data.insert("slug", s(&doc.slug));
        data.insert("url", s(&doc.url));

        let tags: Vec<Value> = self
            .tag_links(doc)
            .into_iter()
            .map(|(tag, url)| Value::from_serialize(BTreeMap::from([("tag", tag), ("url", url)])))
            .collect();
        data.insert("tags", Value::from(tags));

        let (prev, next) = match id {
            Some(id) => self.neighbour_urls(id),
            None => (None, None),
        };
        let link = |url: Option<String>| match url {
            Some(url) => Value::from_serialize(BTreeMap::from([("url", url)])),
            None => none(),
        };
        data.insert("prev", link(prev));
        data.insert("next", link(next));

        let mut user = doc.conf.user.clone();
        user.extend(doc.user.clone());
        data.insert("user", Value::from_serialize(&user));

        let mut description = doc.description.clone();
        if self.configs.matches(&doc.content_path, &doc.templates) {
            description = self
                .templates
                .render_text("documentDescription", &description, &data)
                .with_context(|| doc.content_path.display().to_string())?;
        }
        data.insert(
            "description",
            Value::from_safe_string(self.markup_html(doc, &description)),
        );
        Ok(data)
    }

    /// `(tag, url)` pairs; the URL is empty unless the primary index has tag
    /// pages.
    pub(super) fn tag_links(&self, doc: &Document) -> Vec<(String, String)> {
        let primary = doc.primary_index.map(|ix| self.indexes.get(ix));
        doc.tags
            .iter()
            .map(|tag| {
                let url = primary.and_then(|idx| idx.tag_url(tag)).unwrap_or_default();
                (tag.clone(), url)
            })
            .collect()
    }

    /// URLs of the documents before and after `id` in its primary index.
    pub(super) fn neighbour_urls(&self, id: DocId) -> (Option<String>, Option<String>) {
        let (prev, next) = self.indexes.neighbours(id, self.docs.get(id));
        let url = |id: Option<DocId>| id.map(|id| self.docs.get(id).url.clone());
        (url(prev), url(next))
    }

    fn markup_html(&self, doc: &Document, text: &str) -> String {
        let Some(markup) = Markup::for_path(&doc.content_path) else {
            return text.to_owned();
        };
        let prelude = match markup {
            Markup::Rimu => fs::read_to_string(self.dirs.content.join(RIMU_PRELUDE)).ok(),
            Markup::Markdown => None,
        };
        markup.render(text, prelude.as_deref())
    }

    /// Render a registered document to its build path.
    pub(super) fn render_document(&mut self, id: DocId) -> Result<()> {
        let doc = self.docs.get(id);
        let path = doc.content_path.clone();
        let result = self.render_document_html(doc, id);
        let html = result.with_context(|| path.display().to_string())?;
        let doc = self.docs.get_mut(id);
        if self.opts.lint {
            doc.ids = html::scan_ids(&html);
            doc.urls = html::scan_urls(&html);
        }
        verbose!("render"; "write document: {}", doc.build_path.display());
        fsx::write_text(&doc.build_path, &html)
    }

    fn render_document_html(&self, doc: &Document, id: DocId) -> Result<String> {
        let mut data = self.document_data(doc, Some(id))?;
        let mut markup = doc.content.clone();
        if self.configs.matches(&doc.content_path, &doc.templates) {
            verbose2!("render"; "render template: {}", doc.content_path.display());
            markup = self.templates.render_text("documentMarkup", &markup, &data)?;
        }
        verbose2!("render"; "render document: {}", doc.content_path.display());
        data.insert("body", Value::from_safe_string(self.markup_html(doc, &markup)));
        let html = self.templates.render(&doc.layout, &data)?;
        Ok(html::inject_urlprefix(&html, &doc.conf.urlprefix))
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Render index pages.
    ///
    /// With `only == None` the index is sorted, its tags partitioned and every
    /// page rendered, including `tags.html`. Otherwise only the document and
    /// tag pages containing one of `only` are rendered.
    pub(super) fn build_index(&mut self, ix: IndexId, only: Option<&[DocId]>) -> Result<()> {
        if only.is_none() {
            let idx = self.indexes.get_mut(ix);
            verbose!("index"; "build index: {}", idx.build_dir.display());
            idx.sort(&self.docs);
            idx.partition_tags(&self.docs);
        }
        let idx = self.indexes.get(ix);
        if let Some(tags_template) = &idx.tags_template {
            if only.is_none() {
                let file = idx.build_dir.join(crate::index::TAGS_TEMPLATE);
                let html = self.templates.render(tags_template, &self.tags_data(ix))?;
                self.write_page(ix, &file, &html)?;
            }
            for tag in idx.tag_docs.keys() {
                let pages = idx.tag_pages(tag);
                self.render_pages(ix, &pages, Some(tag), only)?;
            }
        }
        self.render_pages(ix, &idx.doc_pages(), None, only)
    }

    fn render_pages(
        &self,
        ix: IndexId,
        pages: &[Page],
        tag: Option<&str>,
        only: Option<&[DocId]>,
    ) -> Result<()> {
        let idx = self.indexes.get(ix);
        let count: usize = pages.iter().map(|p| p.docs.len()).sum();
        for (i, page) in pages.iter().enumerate() {
            if let Some(only) = only
                && !page.docs.iter().any(|id| only.contains(id))
            {
                continue;
            }
            let docs = page
                .docs
                .iter()
                .map(|&id| {
                    self.document_data(self.docs.get(id), Some(id))
                        .map(|d| Value::from_serialize(&d))
                })
                .collect::<Result<Vec<_>>>()?;
            let mut data = Data::new();
            data.insert("docs", Value::from(docs));
            data.insert("count", int(count));
            data.insert("page", page_data(pages, i));
            data.insert("urlprefix", Value::from(idx.conf.urlprefix.as_str()));
            data.insert("user", Value::from_serialize(&idx.conf.user));
            if let Some(tag) = tag {
                data.insert("tag", Value::from(tag));
            }
            let html = self.templates.render(&idx.docs_template, &data)?;
            self.write_page(ix, &page.file, &html)?;
        }
        Ok(())
    }

    fn tags_data(&self, ix: IndexId) -> Data {
        let idx = self.indexes.get(ix);
        let mut tags: Vec<(&String, &Vec<DocId>)> = idx.tag_docs.iter().collect();
        tags.sort_by_key(|(tag, _)| tag.to_lowercase());
        let tags: Vec<Value> = tags
            .into_iter()
            .map(|(tag, docs)| {
                let mut t = Data::new();
                t.insert("tag", Value::from(tag.as_str()));
                t.insert("url", Value::from(idx.tag_url(tag).unwrap_or_default()));
                t.insert("count", int(docs.len()));
                Value::from_serialize(&t)
            })
            .collect();
        let mut data = Data::new();
        data.insert("tags", Value::from(tags));
        data.insert("urlprefix", Value::from(idx.conf.urlprefix.as_str()));
        data.insert("user", Value::from_serialize(&idx.conf.user));
        data
    }

    fn write_page(&self, ix: IndexId, file: &std::path::Path, html: &str) -> Result<()> {
        let idx = self.indexes.get(ix);
        verbose2!("index"; "write index: {}", file.display());
        fsx::write_text(file, &html::inject_urlprefix(html, &idx.conf.urlprefix))
    }

    /// Every page file a full build of the index writes.
    pub(super) fn index_files(&self, ix: IndexId) -> Vec<PathBuf> {
        let idx = self.indexes.get(ix);
        let mut files: Vec<PathBuf> = idx.doc_pages().into_iter().map(|p| p.file).collect();
        if idx.tags_template.is_some() {
            files.push(idx.build_dir.join(crate::index::TAGS_TEMPLATE));
            for tag in idx.tag_docs.keys() {
                files.extend(idx.tag_pages(tag).into_iter().map(|p| p.file));
            }
        }
        files
    }
}

fn page_data(pages: &[Page], i: usize) -> Value {
    let link = |page: Option<&Page>| match page {
        Some(p) => {
            let mut d = Data::new();
            d.insert("number", int(p.number));
            d.insert("url", Value::from(p.url.as_str()));
            Value::from_serialize(&d)
        }
        None => none(),
    };
    let page = &pages[i];
    let mut data = Data::new();
    data.insert("number", int(page.number));
    data.insert("url", Value::from(page.url.as_str()));
    data.insert("prev", link(i.checked_sub(1).and_then(|p| pages.get(p))));
    data.insert("next", link(pages.get(i + 1)));
    data.insert("first", link(pages.first()));
    data.insert("last", link(pages.last()));
    Value::from_serialize(&data)
}
