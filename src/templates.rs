//! Template collaborator.
//!
//! Two `minijinja` environments are compiled from the template directory on
//! every full build:
//!
//! | Files    | Environment | Escaping |
//! |----------|-------------|----------|
//! | `*.html` | `html`      | HTML     |
//! | `*.txt`  | `text`      | none     |
//!
//! Template names are template-root relative slash paths, e.g.
//! `posts/docs.html`. Inline text (document markup, descriptions and static
//! files) is rendered with the `text` environment so it can include `*.txt`
//! templates.

use crate::utils::fsx;
use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment, Error, Output, State, Value};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Template data map.
pub type Data = BTreeMap<&'static str, Value>;

pub const LAYOUT_TEMPLATE: &str = "layout.html";

pub struct Templates {
    html: Environment<'static>,
    text: Environment<'static>,
    /// Every `layout.html` in the template tree.
    layouts: Vec<PathBuf>,
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

impl Templates {
    pub fn new() -> Self {
        let mut html = Environment::new();
        html.set_auto_escape_callback(|_| AutoEscape::Html);
        html.set_keep_trailing_newline(true);
        html.set_formatter(html_formatter);
        let mut text = Environment::new();
        text.set_auto_escape_callback(|_| AutoEscape::None);
        text.set_keep_trailing_newline(true);
        Self {
            html,
            text,
            layouts: Vec::new(),
        }
    }

    /// Compile every `.html` and `.txt` file under `root`, skipping `skip`
    /// (the `init` directory).
    pub fn parse_dir(root: &Path, skip: &Path) -> Result<Self> {
        let mut templates = Self::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != skip);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = fsx::rel_slash(path, root) else {
                continue;
            };
            match fsx::ext(path).as_str() {
                ".html" => {
                    crate::verbose!("template"; "parse template: {}", path.display());
                    let source = fsx::read_text(path)?;
                    if entry.file_name() == LAYOUT_TEMPLATE {
                        templates.layouts.push(path.to_path_buf());
                    }
                    templates
                        .html
                        .add_template_owned(name, source)
                        .with_context(|| path.display().to_string())?;
                }
                ".txt" => {
                    crate::verbose!("template"; "parse template: {}", path.display());
                    let source = fsx::read_text(path)?;
                    templates
                        .text
                        .add_template_owned(name, source)
                        .with_context(|| path.display().to_string())?;
                }
                _ => {}
            }
        }
        Ok(templates)
    }

    pub fn layouts(&self) -> &[PathBuf] {
        &self.layouts
    }

    pub fn contains(&self, name: &str) -> bool {
        self.html.get_template(name).is_ok()
    }

    /// Render the named HTML template.
    pub fn render(&self, name: &str, data: &Data) -> Result<String> {
        let tmpl = self
            .html
            .get_template(name)
            .with_context(|| format!("missing template: {name}"))?;
        tmpl.render(Value::from_serialize(data))
            .with_context(|| format!("template: {name}"))
    }

    /// Render `source` as a text template. `name` only appears in errors.
    pub fn render_text(&self, name: &str, source: &str, data: &Data) -> Result<String> {
        self.text
            .render_named_str(name, source, Value::from_serialize(data))
            .with_context(|| format!("template: {name}"))
    }
}

/// Escapes `& < > " '` but leaves `/` alone so rendered URLs stay
/// recognisable to prefix injection and lint.
fn html_formatter(out: &mut Output, _state: &State, value: &Value) -> Result<(), Error> {
    if value.is_safe() {
        return Ok(write!(out, "{value}")?);
    }
    let text = value.to_string();
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Ok(out.write_str(&escaped)?)
}

/// Integer template value.
pub fn int(n: usize) -> Value {
    Value::from(n as u64)
}

/// Template `none`.
pub fn none() -> Value {
    Value::from(())
}
