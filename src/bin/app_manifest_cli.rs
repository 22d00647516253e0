//! App Manifest CLI: fragment validation, contract checks and revision diffs
//!
//! Usage:
//!   app-manifest-cli validate [--dir <path>] [--handlers a,b] [--format json|yaml]
//!   app-manifest-cli contract <contract.json> [--dir <path>]
//!   app-manifest-cli diff <from.json> <to.json>
//!   app-manifest-cli core-route <path>
//!   app-manifest-cli schema

use std::path::{Path, PathBuf};

use anyhow::Context;
use app_manifest::manifest::{Issue, LoadResult, ManifestLoader};
use app_manifest::revision::{diff_app_revision_manifests, RevisionSnapshot};
use app_manifest::routes::find_core_route_owner;
use app_manifest::{validate_ui_contract_against_manifest, AppManifest, ErrorContext};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]).await,
        "contract" => cmd_contract(&args[2..]).await,
        "diff" => cmd_diff(&args[2..]),
        "core-route" => cmd_core_route(&args[2..]),
        "schema" => cmd_schema(),
        "version" | "--version" | "-V" => cmd_version(),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"app-manifest-cli - App Manifest command line tool

USAGE:
    app-manifest-cli <COMMAND> [OPTIONS]

COMMANDS:
    validate [--dir <path>] [--handlers a,b] [--format json|yaml]
                                  Load, validate and merge the app fragments
    contract <file> [--dir <path>]
                                  Check a UI contract against the merged manifest
    diff <from.json> <to.json>    Diff two revision snapshots (or raw manifests)
    core-route <path>             Show which core screen owns a path
    schema                        Print the JSON Schema of the merged manifest
    version                       Show version information
    help                          Show this help message

ENVIRONMENT:
    APP_MANIFEST_DIR              App root directory (default: current directory)
    RUST_LOG                      Log filter (default: info)"#
    );
}

fn cmd_version() {
    println!(
        "app-manifest-cli {} (schema {})",
        env!("CARGO_PKG_VERSION"),
        app_manifest::manifest::APP_MANIFEST_SCHEMA_VERSION,
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = true;
            continue;
        }
        out.push(arg.as_str());
    }
    out
}

fn resolve_app_dir(args: &[String]) -> PathBuf {
    if let Some(dir) = flag_value(args, "--dir") {
        return PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("APP_MANIFEST_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from(".")
}

async fn load(args: &[String]) -> LoadResult {
    let dir = resolve_app_dir(args);
    let mut loader = ManifestLoader::new(&dir);
    if let Some(handlers) = flag_value(args, "--handlers") {
        loader = loader.with_handlers(
            handlers
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
        );
    }
    loader.load().await
}

fn print_issues(issues: &[Issue]) {
    for issue in issues {
        println!("  {issue}");
    }
}

async fn cmd_validate(args: &[String]) {
    let result = load(args).await;

    match flag_value(args, "--format") {
        Some("json") => match serde_json::to_string_pretty(&result.issues) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(&format!("cannot encode report: {e}")),
        },
        Some("yaml") => match serde_yaml::to_string(&result.issues) {
            Ok(out) => print!("{out}"),
            Err(e) => fail(&format!("cannot encode report: {e}")),
        },
        Some(other) => {
            let err = app_manifest::Error::configuration_with_context(
                format!("unknown report format '{other}'"),
                ErrorContext::new()
                    .with_field_path("--format")
                    .with_details("expected json or yaml"),
            );
            fail(&err.to_string())
        }
        None => {
            println!("App directory: {}", resolve_app_dir(args).display());
            println!();
            print_issues(&result.issues);
            println!();
            println!("=== Summary ===");
            match &result.manifest {
                Some(m) => println!(
                    "OK: {} routes, {} screens, {} inserts, {} handlers, {} collections, {} buckets ({} warning(s))",
                    m.routes.len(),
                    m.views.screens.len(),
                    m.views.insert.len(),
                    m.ap.handlers.len(),
                    m.data.collections.len(),
                    m.storage.buckets.len(),
                    result.warnings().len(),
                ),
                None => println!("REJECTED: {} error(s)", result.errors().len()),
            }
        }
    }

    if result.has_errors() {
        std::process::exit(1);
    }
}

async fn cmd_contract(args: &[String]) {
    let Some(&file) = positional(args).first() else {
        fail("usage: app-manifest-cli contract <contract.json> [--dir <path>]");
    };
    let contract = read_json(Path::new(file)).unwrap_or_else(|e| fail(&format!("{e:#}")));

    let result = load(args).await;
    let Some(manifest) = result.manifest else {
        println!("Manifest rejected, contract not checked:");
        print_issues(&result.issues);
        std::process::exit(1);
    };

    let issues = validate_ui_contract_against_manifest(&manifest, &contract, file);
    if issues.is_empty() {
        println!("Contract satisfied.");
    } else {
        println!("{} contract warning(s):", issues.len());
        print_issues(&issues);
    }
}

fn cmd_diff(args: &[String]) {
    let files = positional(args);
    let (Some(from), Some(to)) = (files.first(), files.get(1)) else {
        fail("usage: app-manifest-cli diff <from.json> <to.json>");
    };
    let snapshots = read_snapshot(from).and_then(|a| Ok((a, read_snapshot(to)?)));
    let (from, to) = snapshots.unwrap_or_else(|e| fail(&format!("{e:#}")));
    let diff = diff_app_revision_manifests(&from, &to);
    match serde_json::to_string_pretty(&diff) {
        Ok(out) => println!("{out}"),
        Err(e) => fail(&format!("cannot encode diff: {e}")),
    }
    if diff.issues.iter().any(Issue::is_error) {
        std::process::exit(1);
    }
}

fn cmd_core_route(args: &[String]) {
    let Some(&path) = positional(args).first() else {
        fail("usage: app-manifest-cli core-route <path>");
    };
    match find_core_route_owner(path) {
        Some(owner) => println!("{} owns {} (pattern {})", owner.screen_id, path, owner.path),
        None => println!("{path} is not a core route"),
    }
}

fn cmd_schema() {
    match serde_json::to_string_pretty(&AppManifest::json_schema()) {
        Ok(out) => println!("{out}"),
        Err(e) => fail(&format!("cannot encode schema: {e}")),
    }
}

/// A revision file is either a `{id, manifestSnapshot, scriptSnapshotRef?}`
/// record or a bare manifest document.
fn read_snapshot(file: &str) -> anyhow::Result<RevisionSnapshot> {
    let text = std::fs::read_to_string(file).with_context(|| format!("cannot read {file}"))?;
    Ok(serde_json::from_str::<RevisionSnapshot>(&text).unwrap_or_else(|_| RevisionSnapshot::new(file, text)))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}
