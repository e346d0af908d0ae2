//! Markup stage: template rendering and HTML minification
//!
//! Page templates are rendered with tera (Jinja-style `extends`, `include`
//! and `block`), resolving every other template from the markup search path.
//! The rendered page is then minified:
//!
//! - runs of whitespace collapse to one space
//! - whitespace next to block-level tags is dropped
//! - comments are removed, except IE conditional comments
//! - `pre`, `textarea`, `script` and `style` contents are left untouched

use super::{Artifact, SourceFile, Transform, TransformError};
use crate::build::discovery::discover_sources;
use crate::serve::RELOAD_SCRIPT_TAG;
use crate::settings::MarkupOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

/// Elements whose content is copied verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

/// SVG elements whose character data is rendered.
const SVG_TEXT_ELEMENTS: &[&str] = &["text", "tspan", "textpath", "title", "desc"];

/// Elements around which whitespace is insignificant.
const BLOCK_ELEMENTS: &[&str] = &[
    "!doctype", "address", "article", "aside", "base", "blockquote", "body", "br", "caption",
    "col", "colgroup", "dd", "details", "dialog", "div", "dl", "dt", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hgroup",
    "hr", "html", "li", "link", "main", "menu", "meta", "nav", "noscript", "ol", "optgroup",
    "option", "p", "pre", "script", "section", "source", "style", "summary", "table", "tbody",
    "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Options for [`minify_html`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlMinifyOptions {
    /// Collapse insignificant whitespace
    pub collapse_whitespace: bool,
    /// Strip comments (conditional comments are kept)
    pub remove_comments: bool,
}

impl Default for HtmlMinifyOptions {
    fn default() -> Self {
        Self { collapse_whitespace: true, remove_comments: true }
    }
}

impl From<&MarkupOptions> for HtmlMinifyOptions {
    fn from(options: &MarkupOptions) -> Self {
        Self {
            collapse_whitespace: options.collapse_whitespace,
            remove_comments: options.remove_comments,
        }
    }
}

/// Renders page templates and minifies the result.
pub struct MarkupTransform {
    tera: Tera,
    options: MarkupOptions,
}

impl std::fmt::Debug for MarkupTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupTransform").field("options", &self.options).finish_non_exhaustive()
    }
}

impl MarkupTransform {
    /// Load every template under the search paths.
    ///
    /// A template that fails to parse fails the whole load.
    pub fn load(options: &MarkupOptions) -> Result<Self, TransformError> {
        let mut templates = Vec::new();
        for dir in &options.search_paths {
            let pattern = format!("{}/**/*.{{njk,html,htm}}", dir.display());
            let paths =
                discover_sources(&pattern).map_err(|e| TransformError::Template(e.to_string()))?;
            for path in paths {
                let name = template_name(&path, dir);
                let content = fs::read_to_string(&path)?;
                templates.push((name, content));
            }
        }
        tracing::debug!("loaded {} template(s)", templates.len());

        let mut tera = Tera::default();
        tera.add_raw_templates(templates).map_err(template_error)?;
        Ok(Self { tera, options: options.clone() })
    }

    /// Render and minify one page.
    pub fn render(&self, name: &str) -> Result<String, TransformError> {
        let html = self.tera.render(name, &Context::new()).map_err(template_error)?;
        let mut html = minify_html(&html, HtmlMinifyOptions::from(&self.options));
        if self.options.live_reload {
            html = inject_reload_script(&html);
        }
        Ok(html)
    }
}

impl Transform for MarkupTransform {
    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        vec![relative.with_extension("html")]
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        let name = template_name(&source.relative, Path::new(""));
        let html = self.render(&name)?;
        Ok(vec![Artifact::new(source.relative.with_extension("html"), html)])
    }
}

/// Template name: the path below the search directory with `/` separators.
fn template_name(path: &Path, dir: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Flatten a tera error and its causes into one message.
fn template_error(err: tera::Error) -> TransformError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransformError::Template(message)
}

/// Minify an SVG document.
///
/// Comments and whitespace-only text between elements are dropped. Inside
/// text content elements whitespace collapses to one space but is kept.
pub fn minify_svg_markup(svg: &str) -> String {
    let mut tokens = tokenize(svg);
    tokens.retain(|t| !matches!(t, Token::Comment(_)));
    let tokens = merge_text(tokens);

    let mut out = String::with_capacity(svg.len());
    let mut text_depth = 0usize;
    for token in &tokens {
        match token {
            Token::Text(text) => {
                if text_depth == 0 && text.chars().all(|c| c.is_ascii_whitespace()) {
                    continue;
                }
                out.push_str(&collapse_whitespace(text));
            }
            Token::Tag(raw, name) => {
                if SVG_TEXT_ELEMENTS.contains(&name.as_str()) {
                    if raw.starts_with("</") {
                        text_depth = text_depth.saturating_sub(1);
                    } else if !raw.ends_with("/>") {
                        text_depth += 1;
                    }
                }
                out.push_str(&collapse_tag(raw));
            }
            Token::Raw(raw) | Token::Comment(raw) => out.push_str(raw),
        }
    }
    out.trim_matches(|c: char| c.is_ascii_whitespace()).to_string()
}

/// Insert the live-reload client before the last `</body>`, or append it.
pub fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], RELOAD_SCRIPT_TAG, &html[pos..]),
        None => format!("{}{}", html, RELOAD_SCRIPT_TAG),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Text(String),
    /// A start or end tag, with its lower-cased name
    Tag(&'a str, String),
    /// A raw-text element from its start tag through its end tag
    Raw(&'a str),
    Comment(&'a str),
}

impl Token<'_> {
    fn is_block_boundary(&self) -> bool {
        match self {
            Token::Tag(_, name) => BLOCK_ELEMENTS.contains(&name.as_str()),
            Token::Raw(raw) => {
                let name = tag_name(raw);
                BLOCK_ELEMENTS.contains(&name.as_str())
            }
            Token::Comment(_) => true,
            Token::Text(_) => false,
        }
    }
}

/// Minify an HTML document.
pub fn minify_html(html: &str, options: HtmlMinifyOptions) -> String {
    let mut tokens = tokenize(html);

    if options.remove_comments {
        tokens.retain(|t| !matches!(t, Token::Comment(c) if !is_conditional_comment(c)));
        tokens = merge_text(tokens);
    }

    let mut out = String::with_capacity(html.len());
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Text(text) if options.collapse_whitespace => {
                let prev_block = i == 0 || tokens[i - 1].is_block_boundary();
                let next_block = i + 1 == tokens.len() || tokens[i + 1].is_block_boundary();
                let mut text = collapse_whitespace(text);
                if prev_block {
                    text = text.trim_start_matches(' ').to_string();
                }
                if next_block {
                    text = text.trim_end_matches(' ').to_string();
                }
                out.push_str(&text);
            }
            Token::Text(text) => out.push_str(text),
            Token::Tag(raw, _) if options.collapse_whitespace => out.push_str(&collapse_tag(raw)),
            Token::Tag(raw, _) | Token::Raw(raw) | Token::Comment(raw) => out.push_str(raw),
        }
    }
    out
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let lower = html.to_ascii_lowercase();

    while pos < html.len() {
        let rest = &html[pos..];
        if rest.starts_with("<!--") {
            let end = rest[4..].find("-->").map(|i| pos + 4 + i + 3).unwrap_or(html.len());
            tokens.push(Token::Comment(&html[pos..end]));
            pos = end;
        } else if rest.starts_with('<') && starts_tag(rest) {
            let end = tag_end(html, pos);
            let raw = &html[pos..end];
            let name = tag_name(raw);
            if !raw.starts_with("</") && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                let close = format!("</{}", name);
                let end = match lower[end..].find(&close) {
                    Some(i) => tag_end(html, end + i),
                    None => html.len(),
                };
                tokens.push(Token::Raw(&html[pos..end]));
                pos = end;
            } else {
                tokens.push(Token::Tag(raw, name));
                pos = end;
            }
        } else {
            let end = rest
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '<')
                .map(|(i, _)| pos + i)
                .unwrap_or(html.len());
            tokens.push(Token::Text(html[pos..end].to_string()));
            pos = end;
        }
    }
    tokens
}

/// `<` followed by a letter, `/` or `!` opens a tag.
fn starts_tag(rest: &str) -> bool {
    rest[1..].chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
}

/// Byte offset just past the `>` closing the tag at `start`, honouring quotes.
fn tag_end(html: &str, start: usize) -> usize {
    let mut quote = None;
    for (i, c) in html[start..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return start + i + 1,
            _ => {}
        }
    }
    html.len()
}

fn tag_name(raw: &str) -> String {
    raw.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn is_conditional_comment(comment: &str) -> bool {
    comment.starts_with("<!--[if") || comment.starts_with("<!--<![endif]")
}

fn merge_text(tokens: Vec<Token<'_>>) -> Vec<Token<'_>> {
    let mut merged: Vec<Token<'_>> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match (merged.last_mut(), token) {
            (Some(Token::Text(prev)), Token::Text(text)) => prev.push_str(&text),
            (_, token) => merged.push(token),
        }
    }
    merged
}

/// Collapse runs of HTML whitespace to one space. Non-breaking spaces and
/// other Unicode spaces are content and stay.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_was_whitespace = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !prev_was_whitespace {
                out.push(' ');
                prev_was_whitespace = true;
            }
        } else {
            out.push(c);
            prev_was_whitespace = false;
        }
    }
    out
}

/// Collapse whitespace between attributes, leaving quoted values alone.
fn collapse_tag(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut quote = None;
    let mut prev_was_whitespace = false;
    for c in raw.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_ascii_whitespace() => {
                if !prev_was_whitespace {
                    out.push(' ');
                    prev_was_whitespace = true;
                }
                continue;
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                if c == '>' && prev_was_whitespace {
                    out.pop();
                }
                out.push(c);
            }
        }
        prev_was_whitespace = false;
    }
    out
}
