//! Generic per-class stage runner.
//!
//! A stage reads every file matching its class's source pattern, runs the
//! class's transform chain over each and writes the artifacts below the
//! class destination, preserving paths relative to the pattern's glob base.
//!
//! Failures are file-local: a failing file is reported through the context's
//! notifier and recorded in the [`StageReport`], and every other file is still
//! processed.

use crate::build::discovery::{discover_sources, glob_base};
use crate::build::freshness::is_fresh;
use crate::build::{BuildContext, FileResult, StageReport};
use crate::paths::AssetClass;
use crate::transforms::{transform_for, SourceFile, Transform, TransformError};
use rayon::prelude::*;
use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Run one class's stage with its configured transform chain.
pub fn run_stage(ctx: &BuildContext, class: AssetClass) -> StageReport {
    match transform_for(class, ctx) {
        Ok(transform) => run_stage_with(ctx, class, transform.as_ref()),
        Err(e) => fail_all(ctx, class, &e.to_string()),
    }
}

/// Run one class's stage with an explicit transform chain.
pub fn run_stage_with(
    ctx: &BuildContext,
    class: AssetClass,
    transform: &dyn Transform,
) -> StageReport {
    let start = Instant::now();
    let config = ctx.class(class);
    let base = glob_base(&config.source_pattern);

    let sources = match discover_sources(&config.source_pattern) {
        Ok(sources) => sources,
        Err(e) => {
            let message = e.to_string();
            ctx.notify(class, message.clone());
            let mut report = StageReport::new(class);
            report.files.push(FileResult::failed(PathBuf::from(&config.source_pattern), message));
            return report.with_duration(start.elapsed());
        }
    };

    let sources: Vec<PathBuf> = sources
        .into_iter()
        .filter(|path| transform.accepts(&relative_to(path, &base)))
        .collect();

    tracing::debug!(class = %class, count = sources.len(), "running stage");

    let files: Vec<FileResult> = sources
        .par_iter()
        .map(|path| process_file(ctx, class, transform, &base, &config.destination, path))
        .collect();

    let mut report = StageReport::new(class);
    report.files = files;
    let report = report.with_duration(start.elapsed());

    tracing::info!(
        "[{}] {} written, {} skipped, {} failed in {:?}",
        class.label(),
        report.written_count(),
        report.skipped_count(),
        report.failed_count(),
        report.duration
    );
    report
}

fn process_file(
    ctx: &BuildContext,
    class: AssetClass,
    transform: &dyn Transform,
    base: &Path,
    destination: &Path,
    path: &Path,
) -> FileResult {
    let relative = relative_to(path, base);

    if class.skips_fresh() {
        let planned: Vec<PathBuf> =
            transform.outputs(&relative).into_iter().map(|p| destination.join(p)).collect();
        if is_fresh(path, &planned) {
            tracing::debug!("up to date: {}", relative.display());
            return FileResult::skipped(path.to_path_buf());
        }
    }

    match transform_file(transform, base, destination, path) {
        Ok(outputs) => {
            tracing::debug!("wrote {} output(s) for {}", outputs.len(), relative.display());
            FileResult::written(path.to_path_buf(), outputs)
        }
        Err(e) => {
            let message = format!("{}: {}", relative.display(), e);
            tracing::debug!("[{}] {}", class.label(), message);
            ctx.notify(class, message.clone());
            FileResult::failed(path.to_path_buf(), message)
        }
    }
}

fn transform_file(
    transform: &dyn Transform,
    base: &Path,
    destination: &Path,
    path: &Path,
) -> Result<Vec<PathBuf>, TransformError> {
    let source = SourceFile::read(path, base)?;
    // A panic in a third-party transform fails this file only
    let artifacts = catch_unwind(AssertUnwindSafe(|| transform.apply(&source)))
        .map_err(|payload| TransformError::Panicked(panic_message(&*payload)))??;

    let mut outputs = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let output = destination.join(&artifact.relative);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output, &artifact.contents)?;
        outputs.push(output);
    }
    Ok(outputs)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Every source of a run fails with the same message (preparation failed).
fn fail_all(ctx: &BuildContext, class: AssetClass, message: &str) -> StageReport {
    let start = Instant::now();
    tracing::debug!("[{}] {}", class.label(), message);
    ctx.notify(class, message);

    let mut report = StageReport::new(class);
    report.files = discover_sources(&ctx.class(class).source_pattern)
        .unwrap_or_default()
        .into_iter()
        .map(|path| FileResult::failed(path, message.to_string()))
        .collect();
    if report.files.is_empty() {
        let dir = ctx.src_dir().join(class.name());
        report.files.push(FileResult::failed(dir, message.to_string()));
    }
    report.with_duration(start.elapsed())
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default())
}
