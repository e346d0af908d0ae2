//! End-to-end tests for the asset pipeline
//!
//! Each test lays out a small source tree in a temporary directory, runs the
//! pipeline (or one stage of it) and inspects the destination tree.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

use assetpipe::build::{
    build, develop, run_stage, BuildContext, CleanError, DevelopOptions, FileStatus,
    PipelineError,
};
use assetpipe::cli::{execute, Cli, EXIT_ERROR, EXIT_SUCCESS};
use assetpipe::paths::{AssetClass, PathConfig};
use assetpipe::serve::{RELOAD_EVENTS_PATH, RELOAD_SCRIPT_TAG};
use assetpipe::settings::BuildSettings;
use assetpipe::watch::WatchOptions;
use clap::Parser;
use serial_test::serial;

// ============================================================================
// Test Utilities
// ============================================================================

fn context(root: &Path) -> BuildContext {
    let src = root.join("src");
    BuildContext::new(PathConfig::new(&src, root.join("dist")), BuildSettings::new(true, &src))
}

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// Every file under `dir`, relative to it, with `/` separators.
fn files_under(dir: &Path) -> BTreeSet<String> {
    let pattern = format!("{}/**/*", dir.display());
    glob::glob(&pattern)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| p.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// A minimal TrueType file with two tables.
fn tiny_ttf() -> Vec<u8> {
    let head = {
        let mut head = vec![0u8; 54];
        head[..4].copy_from_slice(&[0, 1, 0, 0]);
        head
    };
    let glyf = b"glyph outline ".repeat(16);

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&[0; 6]);
    let data_start = 12 + 2 * 16;
    let records = [(b"glyf", data_start, glyf.len()), (b"head", data_start + 224, head.len())];
    for (tag, offset, len) in records {
        out.extend_from_slice(tag);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(&glyf);
    out.extend_from_slice(&head);
    out
}

fn site(root: &Path) {
    write(
        root,
        "src/html/layouts/base.njk",
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title> Home </title>\n  </head>\n  <body>\n    \
         {% block content %}{% endblock %}\n  </body>\n</html>\n",
    );
    write(
        root,
        "src/html/index.njk",
        "{% extends \"layouts/base.njk\" %}\n{% block content %}\n    <!-- hero -->\n    \
         <h1>Hello</h1>\n{% endblock %}\n",
    );
    write(root, "src/css/base/_vars.scss", "$narrow: 600px;\n$wide: 1200px;\n");
    write(root, "src/css/_mixins.scss", "@mixin hidden { display: none; }\n");
    write(
        root,
        "src/css/main.scss",
        "@import 'base/vars';\n\
         @media (min-width: $narrow) { .menu { float: left; } }\n\
         @media (max-width: $narrow) { .drawer { float: none; } }\n\
         @media (max-width: $wide) { .sidebar { width: 30%; } }\n\
         .button { user-select: none; }\n",
    );
}

// ============================================================================
// Full builds
// ============================================================================

#[test]
fn test_build_maps_every_class() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    site(root);
    write(root, "src/js/app.js", "window.greet = (name) => name ?? 'world';\n");
    write(root, "src/img/icons/dot.svg", "<svg>\n  <circle r=\"1\"/>\n</svg>\n");
    write(root, "src/fonts/Sans.ttf", tiny_ttf());
    write(root, "src/fonts/legacy.eot", b"eot bytes");
    write(root, "src/libs/vendor/lib.min.js", "!function(){}();");
    write(root, "src/meta/robots.txt", "User-agent: *\n");

    let report = build(&context(root)).unwrap();
    assert!(report.is_success(), "{}", report.summary());

    let expected: BTreeSet<String> = [
        "index.html",
        "robots.txt",
        "assets/css/main.css",
        "assets/js/app.js",
        "assets/img/icons/dot.svg",
        "assets/fonts/Sans.woff",
        "assets/fonts/Sans.woff2",
        "assets/fonts/legacy.eot",
        "assets/libs/vendor/lib.min.js",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(files_under(&root.join("dist")), expected);
}

#[test]
fn test_production_scripts_keep_page_globals() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        "src/js/menu.js",
        "function openMenu() { document.body.classList.add('open'); }\nvar counter = 0;\n",
    );

    let report = build(&context(root)).unwrap();
    assert!(report.is_success(), "{}", report.summary());

    let code = fs::read_to_string(root.join("dist/assets/js/menu.js")).unwrap();
    assert!(code.contains("openMenu"), "{code}");
    assert!(code.contains("counter"), "{code}");
}

#[test]
fn test_destination_resolving_to_project_is_refused() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let index = write(root, "src/html/index.njk", "<h1>Hi</h1>");
    let src = root.join("src");
    let ctx = BuildContext::new(
        PathConfig::new(&src, src.join("..")),
        BuildSettings::new(true, &src),
    );

    let result = build(&ctx);

    assert!(matches!(result, Err(PipelineError::Clean(CleanError::ContainsSources { .. }))));
    assert!(index.exists());
}

#[test]
fn test_markup_and_styles_scenario() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    site(root);

    build(&context(root)).unwrap();

    let html = fs::read_to_string(root.join("dist/index.html")).unwrap();
    assert_eq!(
        html,
        "<!DOCTYPE html><html><head><title>Home</title></head><body><h1>Hello</h1></body></html>"
    );

    let styles = files_under(&root.join("dist/assets/css"));
    assert_eq!(styles, BTreeSet::from(["main.css".to_string()]));
    let css = fs::read_to_string(root.join("dist/assets/css/main.css")).unwrap();
    assert!(!css.contains('\n'));
    assert!(css.contains("-webkit-user-select:none"));

    let button = css.find(".button").unwrap();
    let sidebar = css.find(".sidebar").unwrap();
    let drawer = css.find(".drawer").unwrap();
    let menu = css.find(".menu").unwrap();
    assert!(button < sidebar && sidebar < drawer && drawer < menu, "{css}");
}

#[test]
fn test_rebuild_leaves_no_stale_output() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let first = write(root, "src/meta/first.txt", "1");
    write(root, "src/js/old.js", "let a = 1;");
    build(&context(root)).unwrap();
    assert!(root.join("dist/first.txt").exists());

    fs::remove_file(first).unwrap();
    fs::remove_file(root.join("src/js/old.js")).unwrap();
    write(root, "src/meta/second.txt", "2");
    build(&context(root)).unwrap();

    assert_eq!(files_under(&root.join("dist")), BTreeSet::from(["second.txt".to_string()]));
}

#[test]
fn test_failing_file_does_not_block_siblings() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "src/js/good.js", "window.ok = true;");
    write(root, "src/js/bad.js", "function (");
    write(root, "src/meta/robots.txt", "User-agent: *\n");

    let report = build(&context(root)).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_count(), 1);
    assert!(root.join("dist/assets/js/good.js").exists());
    assert!(!root.join("dist/assets/js/bad.js").exists());
    assert!(root.join("dist/robots.txt").exists());
    assert!(report.summary().contains("bad.js"));
}

// ============================================================================
// Freshness
// ============================================================================

#[test]
fn test_fresh_image_not_rewritten() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ctx = context(root);
    let source = write(root, "src/img/logo.svg", "<svg>\n  <rect/>\n</svg>\n");
    set_mtime(&source, SystemTime::now() - Duration::from_secs(3600));

    let first = run_stage(&ctx, AssetClass::Images);
    assert_eq!(first.written_count(), 1);

    let output = root.join("dist/assets/img/logo.svg");
    fs::write(&output, "sentinel").unwrap();
    let second = run_stage(&ctx, AssetClass::Images);

    assert_eq!(second.skipped_count(), 1);
    assert_eq!(second.files[0].status, FileStatus::Skipped);
    assert_eq!(fs::read_to_string(&output).unwrap(), "sentinel");
}

#[test]
fn test_stale_font_rebuilt() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ctx = context(root);
    let source = write(root, "src/fonts/Sans.ttf", tiny_ttf());

    run_stage(&ctx, AssetClass::Fonts);
    let woff = root.join("dist/assets/fonts/Sans.woff");
    let woff2 = root.join("dist/assets/fonts/Sans.woff2");
    assert!(woff.exists() && woff2.exists());

    // only one output older than the source: both are regenerated
    set_mtime(&woff2, SystemTime::now() - Duration::from_secs(3600));
    set_mtime(&source, SystemTime::now() - Duration::from_secs(60));
    let report = run_stage(&ctx, AssetClass::Fonts);

    assert_eq!(report.written_count(), 1);
    assert_eq!(report.files[0].outputs.len(), 2);
}

#[test]
fn test_scripts_always_rebuilt() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ctx = context(root);
    write(root, "src/js/app.js", "window.a = 1;");

    run_stage(&ctx, AssetClass::Scripts);
    let report = run_stage(&ctx, AssetClass::Scripts);
    assert_eq!(report.written_count(), 1);
    assert_eq!(report.skipped_count(), 0);
}

// ============================================================================
// Development server
// ============================================================================

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn connect(port: u16, deadline: Instant) -> TcpStream {
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
                return stream;
            }
            Err(e) if Instant::now() > deadline => panic!("server never came up: {e}"),
            Err(_) => thread::sleep(Duration::from_millis(50)),
        }
    }
}

/// Read from `stream` until the received text contains `needle`.
fn read_until(stream: &mut TcpStream, needle: &str, deadline: Instant) -> String {
    let mut received = String::new();
    let mut buf = [0u8; 4096];
    while !received.contains(needle) {
        assert!(Instant::now() < deadline, "never received {needle:?}, got {received:?}");
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "connection closed before {needle:?}, got {received:?}");
        received.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    received
}

#[test]
fn test_develop_serves_and_reloads_on_script_change() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    write(&root, "src/html/index.njk", "<body>\n  <h1>Hello</h1>\n</body>\n");
    let script = write(&root, "src/js/app.js", "window.a = 1;\n");

    let src = root.join("src");
    let ctx = BuildContext::new(
        PathConfig::new(&src, root.join("dist")),
        BuildSettings::new(false, &src),
    );
    let port = free_port();
    let options = DevelopOptions {
        host: "127.0.0.1".to_string(),
        port,
        watch: WatchOptions { debounce: Duration::from_millis(50), clear_screen: false },
    };
    // develop only returns on failure; the thread ends with the test process
    thread::spawn(move || {
        let _ = develop(&ctx, &options);
    });

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut page = connect(port, deadline);
    page.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
    let response = read_until(&mut page, "</body>", deadline);
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("<h1>Hello</h1>"));
    assert!(response.contains(RELOAD_SCRIPT_TAG));

    let mut events = connect(port, deadline);
    let request = format!("GET {RELOAD_EVENTS_PATH} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    events.write_all(request.as_bytes()).unwrap();
    read_until(&mut events, "text/event-stream", deadline);

    fs::write(&script, "window.a = 2;\n").unwrap();

    let stream = read_until(&mut events, "data: reload", deadline);
    assert!(stream.contains("event: reload"));
    let rebuilt = fs::read_to_string(root.join("dist/assets/js/app.js")).unwrap();
    assert!(rebuilt.contains('2'), "{rebuilt}");
}

// ============================================================================
// Command line
// ============================================================================

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("assetpipe").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_production_flag_builds_and_returns() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let config = write(root, "assetpipe.toml", "[project]\nsrc = \"site\"\ndist = \"public\"\n");
    write(root, "site/meta/robots.txt", "User-agent: *\n");

    let code = execute(&cli(&["--production", "--config", config.to_str().unwrap()]));

    assert_eq!(code, EXIT_SUCCESS);
    assert!(root.join("public/robots.txt").exists());
}

#[test]
fn test_production_build_with_failures_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let config = write(root, "assetpipe.toml", "");
    write(root, "src/css/main.scss", ".a { color: $undefined; }\n");

    let code = execute(&cli(&["--production", "--config", config.to_str().unwrap()]));
    assert_eq!(code, EXIT_ERROR);
}

#[test]
#[serial]
fn test_config_discovered_from_working_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    write(&root, "assetpipe.toml", "[project]\ndist = \"out\"\n");
    write(&root, "src/meta/humans.txt", "team");
    let nested = root.join("src/meta");

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(&nested).unwrap();
    let code = execute(&cli(&["--production"]));
    std::env::set_current_dir(original).unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(root.join("out/humans.txt")).unwrap(), "team");
}
