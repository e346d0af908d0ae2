//! Style sheet chain: SCSS compile, media-query packing, prefixing, minification
//!
//! grass compiles the entry file with the css root as an extra load path.
//! The compiled CSS is parsed by lightningcss, top-level `@media` blocks are
//! merged by identical query and moved after every other rule in
//! [`MediaQuerySort`] order, and the sheet is then minified and printed
//! against [`browser_targets`], which adds the vendor prefixes those browsers
//! still need.

use super::{Artifact, SourceFile, Transform, TransformError};
use crate::settings::{MediaQuerySort, StyleOptions};
use lightningcss::rules::media::MediaRule;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static MAX_WIDTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"max-width\s*:\s*([0-9.]+)\s*(px|em|rem)?|width\s*<=?\s*([0-9.]+)\s*(px|em|rem)?")
        .expect("max-width pattern is valid")
});

static MIN_WIDTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"min-width\s*:\s*([0-9.]+)\s*(px|em|rem)?|width\s*>=?\s*([0-9.]+)\s*(px|em|rem)?")
        .expect("min-width pattern is valid")
});

/// Browsers the printed CSS must work in.
pub fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(95 << 16),
        edge: Some(95 << 16),
        firefox: Some(91 << 16),
        safari: Some(13 << 16),
        ios_saf: Some(13 << 16),
        ..Browsers::default()
    })
}

/// Compiles `*.scss` / `*.sass` entry files to `*.css`.
#[derive(Debug, Clone)]
pub struct StyleTransform {
    options: StyleOptions,
    load_path: PathBuf,
}

impl StyleTransform {
    /// Create the chain; `load_path` is searched for `@import`/`@use` targets.
    pub fn new(options: StyleOptions, load_path: impl Into<PathBuf>) -> Self {
        Self { options, load_path: load_path.into() }
    }

    /// Compile a style sheet file and post-process the result.
    pub fn compile(&self, path: &Path) -> Result<String, TransformError> {
        let options = grass::Options::default().load_path(self.load_path.as_path());
        let css =
            grass::from_path(path, &options).map_err(|e| TransformError::Style(e.to_string()))?;
        self.post_process(&css)
    }

    /// Pack media queries, prefix and (optionally) minify plain CSS.
    pub fn post_process(&self, css: &str) -> Result<String, TransformError> {
        let targets = browser_targets();
        let mut sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| TransformError::Style(e.to_string()))?;

        sort_media_queries(&mut sheet.rules.0, self.options.media_query_sort, targets)?;

        sheet
            .minify(MinifyOptions { targets, ..MinifyOptions::default() })
            .map_err(|e| TransformError::Style(e.to_string()))?;
        let printed = sheet
            .to_css(PrinterOptions { minify: self.options.minify, targets, ..Default::default() })
            .map_err(|e| TransformError::Style(e.to_string()))?;

        Ok(printed.code)
    }
}

impl Transform for StyleTransform {
    /// Partials (`_name.scss`) are only compiled through imports.
    fn accepts(&self, relative: &Path) -> bool {
        !relative
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('_'))
            .unwrap_or(false)
    }

    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        vec![relative.with_extension("css")]
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        let css = self.compile(&source.path)?;
        Ok(vec![Artifact::new(source.relative.with_extension("css"), css)])
    }
}

/// Merge top-level `@media` rules with identical queries and move them after
/// all other rules, ordered by `sort`.
///
/// Queries without a width condition keep their source order after the
/// width-based ones.
pub fn sort_media_queries<'i, R>(
    rules: &mut Vec<CssRule<'i, R>>,
    sort: MediaQuerySort,
    targets: Targets,
) -> Result<(), TransformError> {
    let mut plain = Vec::with_capacity(rules.len());
    let mut media: Vec<(String, MediaRule<'i, R>)> = Vec::new();

    for rule in std::mem::take(rules) {
        match rule {
            CssRule::Media(block) => {
                let key = block
                    .query
                    .to_css_string(PrinterOptions { targets, ..Default::default() })
                    .map_err(|e| TransformError::Style(e.to_string()))?;
                match media.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, existing)) => existing.rules.0.extend(block.rules.0),
                    None => media.push((key, block)),
                }
            }
            other => plain.push(other),
        }
    }

    // sort_by is stable, so equal keys keep source order
    media.sort_by(|(a, _), (b, _)| compare_queries(a, b, sort));

    rules.extend(plain);
    rules.extend(media.into_iter().map(|(_, block)| CssRule::Media(block)));
    Ok(())
}

fn compare_queries(a: &str, b: &str, sort: MediaQuerySort) -> Ordering {
    let (rank_a, value_a) = query_rank(a, sort);
    let (rank_b, value_b) = query_rank(b, sort);
    rank_a.cmp(&rank_b).then(value_a.partial_cmp(&value_b).unwrap_or(Ordering::Equal))
}

/// Group and in-group sort value of a query.
fn query_rank(query: &str, sort: MediaQuerySort) -> (u8, f64) {
    let max = width_px(&MAX_WIDTH_RE, query);
    let min = width_px(&MIN_WIDTH_RE, query);
    match (sort, max, min) {
        (MediaQuerySort::DesktopFirst, Some(w), _) => (0, -w),
        (MediaQuerySort::DesktopFirst, None, Some(w)) => (1, w),
        (MediaQuerySort::MobileFirst, _, Some(w)) => (0, w),
        (MediaQuerySort::MobileFirst, Some(w), None) => (1, -w),
        _ => (2, 0.0),
    }
}

/// First width matched by `re`, in pixels (`em`/`rem` count as 16px).
fn width_px(re: &Regex, query: &str) -> Option<f64> {
    let caps = re.captures(query)?;
    let (number, unit) = match caps.get(1) {
        Some(n) => (n, caps.get(2)),
        None => (caps.get(3)?, caps.get(4)),
    };
    let value: f64 = number.as_str().parse().ok()?;
    match unit.map(|u| u.as_str()) {
        Some("em") | Some("rem") => Some(value * 16.0),
        _ => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn transform() -> StyleTransform {
        StyleTransform::new(
            StyleOptions { media_query_sort: MediaQuerySort::DesktopFirst, minify: true },
            "/nonexistent",
        )
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack.find(needle).unwrap_or_else(|| panic!("{needle} not in {haystack}"))
    }

    const MIXED: &str = "
        .a { color: red; }
        @media (min-width: 600px) { .b { color: blue; } }
        @media (max-width: 500px) { .c { color: green; } }
        .d { color: black; }
        @media (max-width: 900px) { .e { color: purple; } }
        @media (min-width: 600px) { .f { color: orange; } }
        @media print { .g { color: gray; } }
        @media (min-width: 300px) { .h { color: teal; } }
    ";

    #[test]
    fn test_desktop_first_order() {
        let css = transform().post_process(MIXED).unwrap();

        assert!(position(&css, ".d") < position(&css, ".e"));
        assert!(position(&css, ".e") < position(&css, ".c"));
        assert!(position(&css, ".c") < position(&css, ".h"));
        assert!(position(&css, ".h") < position(&css, ".b"));
        assert!(position(&css, ".f") < position(&css, ".g"));
    }

    #[test]
    fn test_mobile_first_order() {
        let styles = StyleTransform::new(
            StyleOptions { media_query_sort: MediaQuerySort::MobileFirst, minify: true },
            "/nonexistent",
        );
        let css = styles.post_process(MIXED).unwrap();

        assert!(position(&css, ".h") < position(&css, ".b"));
        assert!(position(&css, ".b") < position(&css, ".e"));
        assert!(position(&css, ".e") < position(&css, ".c"));
        assert!(position(&css, ".c") < position(&css, ".g"));
    }

    #[test]
    fn test_identical_queries_merged() {
        let css = transform().post_process(MIXED).unwrap();
        assert_eq!(css.matches("@media").count(), 5);

        let merged = position(&css, ".b");
        assert!(merged < position(&css, ".f"));
        assert!(!css[merged..position(&css, ".f")].contains("@media"));
    }

    #[test]
    fn test_media_moved_after_plain_rules() {
        let css = transform().post_process(MIXED).unwrap();
        assert!(position(&css, ".a") < position(&css, "@media"));
        assert!(position(&css, ".d") < position(&css, "@media"));
    }

    #[test]
    fn test_em_widths_compare_as_pixels() {
        let css = transform()
            .post_process(
                "@media (max-width: 40em) { .em { top: 0; } }
                 @media (max-width: 700px) { .px { top: 0; } }",
            )
            .unwrap();
        // 40em is 640px
        assert!(position(&css, ".px") < position(&css, ".em"));
    }

    #[test]
    fn test_prefixes_for_targets() {
        let css = transform().post_process(".x { user-select: none; }").unwrap();
        assert!(css.contains("-webkit-user-select:none"));
        assert!(css.contains("user-select:none"));
    }

    #[test]
    fn test_minified_output() {
        let css = transform().post_process(".a {\n  color: #ff0000;\n}\n").unwrap();
        assert_eq!(css, ".a{color:red}");
    }

    #[test]
    fn test_invalid_css_is_error() {
        let result = transform().post_process("..a { color: red; }");
        assert!(matches!(result, Err(TransformError::Style(_))));
    }

    #[test]
    fn test_width_px() {
        assert_eq!(width_px(&MAX_WIDTH_RE, "(max-width: 768px)"), Some(768.0));
        assert_eq!(width_px(&MAX_WIDTH_RE, "(width <= 48em)"), Some(768.0));
        assert_eq!(width_px(&MIN_WIDTH_RE, "screen and (min-width:1.5rem)"), Some(24.0));
        assert_eq!(width_px(&MIN_WIDTH_RE, "(max-width: 768px)"), None);
        assert_eq!(width_px(&MAX_WIDTH_RE, "print"), None);
    }

    #[test]
    fn test_partials_rejected() {
        let styles = transform();
        assert!(styles.accepts(Path::new("main.scss")));
        assert!(!styles.accepts(Path::new("_vars.scss")));
        assert!(!styles.accepts(Path::new("base/_reset.sass")));
    }

    #[test]
    fn test_outputs_css() {
        assert_eq!(transform().outputs(Path::new("main.scss")), vec![PathBuf::from("main.css")]);
        assert_eq!(transform().outputs(Path::new("theme.sass")), vec![PathBuf::from("theme.css")]);
    }

    #[test]
    fn test_compiles_with_partial_import() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("css");
        fs::create_dir_all(root.join("base")).unwrap();
        fs::write(root.join("base/_vars.scss"), "$brand: #ff0000;\n").unwrap();
        fs::write(
            root.join("main.scss"),
            "@import 'base/vars';\n.nav {\n  a { color: $brand; }\n}\n",
        )
        .unwrap();

        let styles = StyleTransform::new(
            StyleOptions { media_query_sort: MediaQuerySort::DesktopFirst, minify: true },
            &root,
        );
        let source = SourceFile::read(&root.join("main.scss"), &root).unwrap();
        let out = styles.apply(&source).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relative, PathBuf::from("main.css"));
        assert_eq!(String::from_utf8(out[0].contents.clone()).unwrap(), ".nav a{color:red}");
    }

    #[test]
    fn test_compile_error_is_style_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.scss");
        fs::write(&path, ".a { color: $missing; }\n").unwrap();

        let err = transform().compile(&path).unwrap_err();
        assert!(matches!(err, TransformError::Style(_)));
        assert!(err.to_string().contains("Undefined variable"));
    }
}
