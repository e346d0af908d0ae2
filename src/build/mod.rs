//! Build pipeline module for assetpipe
//!
//! Turns the seven source trees under the source root into the deployable
//! destination tree.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using the per-class glob patterns
//! - **Stages**: Run each class's transform chain over its files
//! - **Orchestration**: Clean, fan the stages out, and collect a report
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{build, BuildContext};
//! use assetpipe::paths::PathConfig;
//! use assetpipe::settings::BuildSettings;
//!
//! let ctx = BuildContext::new(PathConfig::new("src", "dist"), BuildSettings::new(true, "src"));
//! let report = build(&ctx)?;
//! println!("{}", report.summary());
//! ```

pub mod clean;
pub mod context;
pub mod discovery;
pub mod freshness;
pub mod pipeline;
pub mod result;
pub mod stage;

pub use clean::*;
pub use context::*;
pub use discovery::*;
pub use freshness::*;
pub use pipeline::*;
pub use result::*;
pub use stage::*;
