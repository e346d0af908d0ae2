//! assetpipe - Static-site asset pipeline
//!
//! This library provides functionality to:
//! - Render page templates and minify the resulting HTML
//! - Compile SCSS, pack media queries, prefix and minify CSS
//! - Lower and minify scripts, recompress images, convert fonts to WOFF/WOFF2
//! - Rebuild one asset class at a time on file changes
//! - Serve the output with live reload during development

pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod notification;
pub mod paths;
pub mod serve;
pub mod settings;
pub mod transforms;
pub mod watch;
