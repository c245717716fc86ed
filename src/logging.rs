use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialise logging. Without `debug` the level is fixed at `info`; with it
/// the default is `debug` and `RUST_LOG` may override it.
/// When `log_file` is given, output is also appended to that file.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Ignore `RUST_LOG` unless debug logging was asked for in the config, so a
    // stray variable in the user's environment cannot flood the console.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let file_layer = log_file.and_then(|path| {
        let Some(file_name) = path.file_name() else {
            eprintln!("log file path {} has no file name", path.display());
            return None;
        };
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if FILE_GUARD.set(guard).is_err() {
            return None;
        }
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();
}
