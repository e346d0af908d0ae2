//! Build pipeline orchestration.
//!
//! Two entry points exist: [`build`] (clean, then every stage in parallel)
//! and [`develop`] (build, then watch and serve until interrupted). Which one
//! runs is fixed at process start by [`Mode::select`].

use crate::build::clean::{clean_destination, CleanError};
use crate::build::stage::run_stage;
use crate::build::{BuildContext, BuildReport, StageReport};
use crate::paths::AssetClass;
use crate::serve::{DevServer, LiveReload, ServeError};
use crate::settings::BuildSettings;
use crate::watch::{WatchError, WatchOptions, Watcher};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Error that aborts a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The destination could not be cleaned
    #[error("Clean failed: {0}")]
    Clean(#[from] CleanError),
    /// The watcher could not be started
    #[error(transparent)]
    Watch(#[from] WatchError),
    /// The server could not be started or stopped unexpectedly
    #[error(transparent)]
    Serve(#[from] ServeError),
    /// The async runtime could not be created
    #[error("Failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

/// Top-level entry point selected by the build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One-shot build
    Build,
    /// Build, then watch and serve
    Develop,
}

impl Mode {
    /// Production runs build once; everything else develops.
    pub fn select(settings: &BuildSettings) -> Self {
        if settings.is_production() {
            Mode::Build
        } else {
            Mode::Develop
        }
    }
}

/// Settings for the development server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevelopOptions {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Watch settings
    pub watch: WatchOptions,
}

/// Clean the destination, then run all seven stages concurrently.
///
/// Returns once every stage has processed its whole file set. File-local
/// failures are recorded in the report; only a clean failure aborts.
pub fn build(ctx: &BuildContext) -> Result<BuildReport, PipelineError> {
    let start = Instant::now();

    clean_destination(ctx.out_dir(), ctx.src_dir())?;
    tracing::info!("building {} -> {}", ctx.src_dir().display(), ctx.out_dir().display());

    // collect() keeps class order regardless of completion order
    let stages: Vec<StageReport> =
        AssetClass::ALL.par_iter().map(|&class| run_stage(ctx, class)).collect();

    let mut report = BuildReport::new();
    for stage in stages {
        report.add_stage(stage);
    }
    Ok(report.with_duration(start.elapsed()))
}

/// Build, then watch sources and serve the destination with live reload.
///
/// Only returns when the watcher or the server fails.
pub fn develop(ctx: &BuildContext, options: &DevelopOptions) -> Result<(), PipelineError> {
    let report = build(ctx)?;
    println!("{}", report.summary());

    let reload = LiveReload::new();
    let watcher = Watcher::start(ctx, Arc::new(reload.clone()), &options.watch, &report)?;
    tracing::info!("watching {} class(es) for changes", watcher.classes().len());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(PipelineError::Runtime)?;
    let server = DevServer::new(ctx.out_dir(), options.host.clone(), options.port, reload);
    let result = runtime.block_on(server.run());

    drop(watcher);
    result.map_err(PipelineError::from)
}
