//! Per-class transform chains
//!
//! Every asset class maps to one [`Transform`] implementation. The chain for
//! a class is fixed; only the options carried in
//! [`crate::settings::BuildSettings`] vary with the build mode.
//!
//! # Module Structure
//!
//! - [`types`] - The `Transform` trait, source/artifact values and errors
//! - [`markup`] - Template rendering and HTML minification
//! - [`styles`] - SCSS compilation, media-query sorting, prefixing, minification
//! - [`scripts`] - Script lowering and minification
//! - [`images`] - Image recompression
//! - [`fonts`] - WOFF and WOFF2 conversion
//! - [`verbatim`] - Byte-for-byte copies for libraries and meta files

pub mod fonts;
pub mod images;
pub mod markup;
pub mod scripts;
pub mod styles;
pub mod types;
pub mod verbatim;

pub use fonts::FontTransform;
pub use images::ImageTransform;
pub use markup::{minify_html, MarkupTransform};
pub use scripts::ScriptTransform;
pub use styles::{sort_media_queries, StyleTransform};
pub use types::{Artifact, SourceFile, Transform, TransformError};
pub use verbatim::VerbatimTransform;

use crate::build::BuildContext;
use crate::paths::AssetClass;

/// Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Prepare the transform chain for one run of a class's stage.
///
/// Markup loads its template set here, so template errors surface once per
/// run; every other class prepares infallibly.
pub fn transform_for(class: AssetClass, ctx: &BuildContext) -> Result<Box<dyn Transform>> {
    let settings = ctx.settings();
    Ok(match class {
        AssetClass::Markup => Box::new(MarkupTransform::load(&settings.markup)?),
        AssetClass::Styles => {
            Box::new(StyleTransform::new(settings.styles.clone(), ctx.src_dir().join("css")))
        }
        AssetClass::Scripts => Box::new(ScriptTransform::new(settings.scripts.clone())),
        AssetClass::Images => Box::new(ImageTransform::new(settings.images)),
        AssetClass::Fonts => Box::new(FontTransform),
        AssetClass::Libraries | AssetClass::Meta => Box::new(VerbatimTransform),
    })
}
