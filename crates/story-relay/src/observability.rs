use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "story-relay.logs.jsonl";

/// Where relay logs go.
#[derive(Debug, PartialEq, Eq)]
enum LogSink {
    Disabled,
    Console,
    JsonFile(PathBuf),
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn resolve_sink(enabled: Option<&str>, json_path: Option<&str>) -> LogSink {
    if enabled.and_then(parse_flag) == Some(false) {
        return LogSink::Disabled;
    }
    match json_path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => LogSink::JsonFile(PathBuf::from(path)),
        None => LogSink::Console,
    }
}

fn resolve_filter() -> EnvFilter {
    std::env::var("STORY_LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Splits a log path into its directory and file name, creating the directory.
fn prepare_log_file(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&dir);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize relay logging once per process.
///
/// Environment variables:
/// - `STORY_OBSERVABILITY_ENABLED`: set to `false`/`off`/`0` to disable logging.
/// - `STORY_LOG_LEVEL`: filter directive (`info`, `story_relay=debug`, ...).
///   Falls back to `RUST_LOG`, then `info`.
/// - `STORY_JSON_LOG_PATH`: write JSON lines to this file instead of stdout.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let enabled = std::env::var("STORY_OBSERVABILITY_ENABLED").ok();
        let json_path = std::env::var("STORY_JSON_LOG_PATH").ok();
        let filter = resolve_filter();

        match resolve_sink(enabled.as_deref(), json_path.as_deref()) {
            LogSink::Disabled => {}
            LogSink::JsonFile(path) => {
                let (dir, file_name) = prepare_log_file(&path);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_target(false)
                            .with_writer(writer),
                    )
                    .try_init();
            }
            LogSink::Console => {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_target(false)
                            .with_writer(std::io::stdout),
                    )
                    .try_init();
            }
        }
    });
}
