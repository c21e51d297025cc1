//! File logging for the terminal host.
//!
//! The terminal is owned by the editor UI, so logs only ever go to a file.
//! The filter is taken from `QUIRE_LOG`, then `RUST_LOG`, and defaults to
//! `warn` globally with `info` for this crate.
//!
//! Default location: `$XDG_STATE_HOME/quire/logs/quire-<pid>.log`, falling
//! back to `~/.local/state`. Override with `--log-file <path>`.

use std::env;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn,quire=info";

/// Must stay alive for the lifetime of the program; dropping it flushes the
/// background writer.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub log_file: PathBuf,
}

pub fn init(log_file: Option<PathBuf>) -> anyhow::Result<LogGuard> {
    let (dir, filename) = resolve_log_path(log_file);
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, &filename);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(env_filter()?);

    Registry::default().with(layer).try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_file: dir.join(filename),
    })
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    let directives = env::var("QUIRE_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    Ok(EnvFilter::try_new(directives)?)
}

fn resolve_log_path(override_path: Option<PathBuf>) -> (PathBuf, String) {
    let filename = format!("quire-{}.log", std::process::id());

    if let Some(path) = override_path {
        if path.extension().is_some() {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or(filename);
            return (dir, name);
        }
        return (path, filename);
    }

    let base = env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state")))
        .unwrap_or_else(|| PathBuf::from("."));
    (base.join("quire").join("logs"), filename)
}
