//! Build-mode settings fixed once at process start.
//!
//! The `--production` flag decides which top-level entry point runs and which
//! per-class options are used. The value is constructed at process entry and
//! handed to every component through [`crate::build::BuildContext`].

use std::path::PathBuf;

/// Options for the markup stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOptions {
    /// Collapse runs of insignificant whitespace
    pub collapse_whitespace: bool,
    /// Strip HTML comments (conditional comments are kept)
    pub remove_comments: bool,
    /// Directories that templates, layouts and partials are loaded from
    pub search_paths: Vec<PathBuf>,
    /// Inject the live-reload client before `</body>`
    pub live_reload: bool,
}

/// Order applied to media-query blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaQuerySort {
    /// `max-width` descending, then `min-width` ascending
    #[default]
    DesktopFirst,
    /// `min-width` ascending, then `max-width` descending
    MobileFirst,
}

/// Options for the styles stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    /// Media-query reordering strategy
    pub media_query_sort: MediaQuerySort,
    /// Minify and dedupe the printed style sheet
    pub minify: bool,
}

/// Options for the scripts stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Language level scripts are lowered to
    pub target: String,
    /// Compress and print without whitespace
    pub minify: bool,
    /// Rename local identifiers
    pub mangle: bool,
    /// Remove `debugger` statements
    pub drop_debugger: bool,
}

/// Options for the images stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// oxipng optimisation preset (0-6)
    pub png_preset: u8,
    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,
}

/// Immutable settings for one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    production: bool,
    /// Markup stage options
    pub markup: MarkupOptions,
    /// Styles stage options
    pub styles: StyleOptions,
    /// Scripts stage options
    pub scripts: ScriptOptions,
    /// Images stage options
    pub images: ImageOptions,
}

impl BuildSettings {
    /// Settings for an explicit mode.
    ///
    /// `src_root` is the source root the markup search path is resolved in.
    pub fn new(production: bool, src_root: impl Into<PathBuf>) -> Self {
        let src_root = src_root.into();
        Self {
            production,
            markup: MarkupOptions {
                collapse_whitespace: true,
                remove_comments: true,
                search_paths: vec![src_root.join("html")],
                live_reload: !production,
            },
            styles: StyleOptions { media_query_sort: MediaQuerySort::DesktopFirst, minify: true },
            scripts: ScriptOptions {
                target: "es2015".to_string(),
                minify: production,
                mangle: production,
                drop_debugger: production,
            },
            images: ImageOptions { png_preset: 2, jpeg_quality: 80 },
        }
    }

    /// Whether this is a one-shot production build.
    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Whether this is a watching development run.
    pub fn is_development(&self) -> bool {
        !self.production
    }
}
