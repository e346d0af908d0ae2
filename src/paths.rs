//! Source and destination layout for every asset class.
//!
//! The layout is fixed: each class lives in its own subdirectory of the
//! source root and is written to a fixed place under the destination root.
//! Only the two roots vary.

use std::fmt;
use std::path::{Path, PathBuf};

/// One of the seven categories of source material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetClass {
    /// Page templates rendered to HTML
    Markup,
    /// SCSS/Sass style sheets compiled to CSS
    Styles,
    /// JavaScript sources
    Scripts,
    /// Raster and vector images
    Images,
    /// Font files
    Fonts,
    /// Third-party libraries copied verbatim
    Libraries,
    /// Root-level meta files (robots.txt, favicons, manifests)
    Meta,
}

impl AssetClass {
    /// All classes, in the order they are reported.
    pub const ALL: [AssetClass; 7] = [
        AssetClass::Markup,
        AssetClass::Styles,
        AssetClass::Scripts,
        AssetClass::Images,
        AssetClass::Fonts,
        AssetClass::Libraries,
        AssetClass::Meta,
    ];

    /// Human-readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::Markup => "HTML",
            AssetClass::Styles => "CSS",
            AssetClass::Scripts => "JavaScript",
            AssetClass::Images => "Images",
            AssetClass::Fonts => "Fonts",
            AssetClass::Libraries => "Libs",
            AssetClass::Meta => "Meta files",
        }
    }

    /// Short name, also the source subdirectory.
    pub fn name(&self) -> &'static str {
        match self {
            AssetClass::Markup => "html",
            AssetClass::Styles => "css",
            AssetClass::Scripts => "js",
            AssetClass::Images => "img",
            AssetClass::Fonts => "fonts",
            AssetClass::Libraries => "libs",
            AssetClass::Meta => "meta",
        }
    }

    /// Whether files already newer in the destination are skipped.
    pub fn skips_fresh(&self) -> bool {
        matches!(self, AssetClass::Images | AssetClass::Fonts | AssetClass::Libraries)
    }

    fn source_suffix(&self) -> &'static str {
        match self {
            AssetClass::Markup => "/html/*.njk",
            AssetClass::Styles => "/css/*.{scss,sass}",
            AssetClass::Scripts => "/js/*.js",
            AssetClass::Images => "/img/**/*.{png,jpg,jpeg,gif,svg}",
            AssetClass::Fonts => "/fonts/**/*.{eot,ttf,otf,otc,ttc,woff,woff2,svg}",
            AssetClass::Libraries => "/libs/**/*",
            AssetClass::Meta => "/meta/**/*",
        }
    }

    fn watch_suffix(&self) -> &'static str {
        match self {
            AssetClass::Markup => "/html/**/*.njk",
            AssetClass::Styles => "/css/**/*.{scss,sass}",
            AssetClass::Scripts => "/js/**/*.js",
            other => other.source_suffix(),
        }
    }

    fn destination_suffix(&self) -> &'static str {
        match self {
            AssetClass::Markup | AssetClass::Meta => "",
            AssetClass::Styles => "/assets/css",
            AssetClass::Scripts => "/assets/js",
            AssetClass::Images => "/assets/img",
            AssetClass::Fonts => "/assets/fonts",
            AssetClass::Libraries => "/assets/libs",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source pattern, watch pattern and destination for one asset class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetClassConfig {
    /// Files processed by a build
    pub source_pattern: String,
    /// Files observed in development mode
    pub watch_pattern: String,
    /// Directory outputs are written into
    pub destination: PathBuf,
}

/// The complete, immutable path table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    src_root: PathBuf,
    dist_root: PathBuf,
    classes: [AssetClassConfig; 7],
}

impl PathConfig {
    /// Build the table from a source root and a destination root.
    pub fn new(src_root: impl Into<PathBuf>, dist_root: impl Into<PathBuf>) -> Self {
        let src_root = src_root.into();
        let dist_root = dist_root.into();
        let src = trim_separator(&src_root);
        let dist = trim_separator(&dist_root);

        let classes = AssetClass::ALL.map(|class| AssetClassConfig {
            source_pattern: format!("{}{}", src, class.source_suffix()),
            watch_pattern: format!("{}{}", src, class.watch_suffix()),
            destination: PathBuf::from(format!("{}{}", dist, class.destination_suffix())),
        });

        Self { src_root, dist_root, classes }
    }

    /// Source root directory.
    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    /// Destination root directory (removed by the cleaner).
    pub fn dist_root(&self) -> &Path {
        &self.dist_root
    }

    /// Configuration for one class.
    pub fn get(&self, class: AssetClass) -> &AssetClassConfig {
        // ALL is declared in discriminant order
        &self.classes[class as usize]
    }

    /// Iterate over every class with its configuration.
    pub fn iter(&self) -> impl Iterator<Item = (AssetClass, &AssetClassConfig)> {
        AssetClass::ALL.iter().copied().zip(self.classes.iter())
    }
}

fn trim_separator(path: &Path) -> String {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !s.is_empty() {
        // the filesystem root itself
        String::new()
    } else {
        trimmed.to_string()
    }
}
