//! assetpipe - build, watch and serve a static site's assets

use std::process::ExitCode;

use assetpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
