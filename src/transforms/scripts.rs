//! Script chain: parse, lower to the configured language level, minify
//!
//! Every script is lowered with oxc_transformer. Production builds then run
//! the oxc minifier (compression plus identifier mangling) and print without
//! whitespace or comments; development output stays readable.

use super::{Artifact, SourceFile, Transform, TransformError};
use crate::settings::ScriptOptions;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc_mangler::MangleOptions;
use oxc_minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use std::path::{Path, PathBuf};

/// Lowers and optionally minifies `*.js` files.
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    options: ScriptOptions,
}

impl ScriptTransform {
    /// Create the chain.
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }

    /// Run the chain over script text. `path` is used for diagnostics and to
    /// pick the source type.
    ///
    /// Files are parsed as classic scripts unless they end in `.mjs`: their
    /// top-level bindings are page globals, so the minifier must neither drop
    /// nor rename them.
    pub fn process(&self, path: &Path, source: &str) -> Result<String, TransformError> {
        let allocator = Allocator::default();
        let source_type = script_source_type(path);

        let parsed = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = parsed.errors.first() {
            return Err(TransformError::Script(format!("parse error: {error}")));
        }
        let mut program = parsed.program;

        let transform_options = TransformOptions::from_target(&self.options.target)
            .map_err(|e| TransformError::Script(format!("invalid target: {e}")))?;
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let lowered = Transformer::new(&allocator, path, &transform_options)
            .build_with_scoping(scoping, &mut program);
        if let Some(error) = lowered.errors.first() {
            return Err(TransformError::Script(format!("transform error: {error}")));
        }

        if !self.options.minify {
            return Ok(Codegen::new().build(&program).code);
        }

        let compress = CompressOptions {
            drop_debugger: self.options.drop_debugger,
            ..CompressOptions::smallest()
        };
        let minified = Minifier::new(MinifierOptions {
            mangle: self.options.mangle.then(MangleOptions::default),
            compress: Some(compress),
        })
        .minify(&allocator, &mut program);

        let printed = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(minified.scoping)
            .build(&program);
        Ok(printed.code)
    }
}

fn script_source_type(path: &Path) -> SourceType {
    let is_module = path.extension().is_some_and(|ext| ext == "mjs");
    SourceType::from_path(path).unwrap_or_default().with_script(!is_module)
}

impl Transform for ScriptTransform {
    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        vec![relative.to_path_buf()]
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        let code = self.process(&source.path, source.text()?)?;
        Ok(vec![Artifact::new(source.relative.clone(), code)])
    }
}
