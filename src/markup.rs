//! Markup to HTML conversion.

use pulldown_cmark::{Options, Parser, html::push_html};
use std::path::Path;

/// Content root file prepended to every `.rmu` document.
pub const RIMU_PRELUDE: &str = "config.rmu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    Markdown,
    Rimu,
}

impl Markup {
    /// Converter for a document path, selected by extension.
    pub fn for_path(path: &Path) -> Option<Self> {
        match crate::utils::fsx::ext(path).as_str() {
            ".md" => Some(Self::Markdown),
            ".rmu" => Some(Self::Rimu),
            _ => None,
        }
    }

    /// Convert `text` to HTML. `prelude` is prepended to Rimu documents.
    pub fn render(self, text: &str, prelude: Option<&str>) -> String {
        match (self, prelude) {
            (Self::Rimu, Some(prelude)) => markdown(&format!("{prelude}\n\n{text}")),
            _ => markdown(text),
        }
    }
}

fn markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;
    let mut html = String::with_capacity(text.len() * 3 / 2);
    push_html(&mut html, Parser::new_ext(text, options));
    html
}
