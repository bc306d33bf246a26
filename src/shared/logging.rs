use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging: console always, plus a log file when `log_dir` is writable.
///
/// The console writes synchronously so log lines stay ordered with `println!`
/// output. Hold the returned guard until exit; dropping it flushes the file.
pub fn init_service_logging(
    log_dir: Option<&Path>,
    service_name: &str,
) -> Result<Option<WorkerGuard>, anyhow::Error> {
    // Set up environment filter (can be controlled via RUST_LOG env var)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let writable_dir = log_dir.filter(|dir| can_write_logs(dir));

    if let Some(dir) = writable_dir {
        let _ = rotate_logs_on_startup(dir, service_name);

        let (non_blocking_file, guard_file) = non_blocking(file_appender(dir, service_name));

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false) // No colors in file logs
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        info!(
            "Logging initialized - logs will be written to {}",
            dir.join(log_file_name(service_name)).display()
        );
        Ok(Some(guard_file))
    } else {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()?;

        if let Some(dir) = log_dir {
            info!(
                "Logging initialized - console output only (could not write to {})",
                dir.display()
            );
        }
        Ok(None)
    }
}

fn log_file_name(service_name: &str) -> String {
    format!("{service_name}.log")
}

// One file per run; the previous run's file is moved aside by
// `rotate_logs_on_startup` before this is opened.
fn file_appender(dir: &Path, service_name: &str) -> RollingFileAppender {
    rolling::never(dir, log_file_name(service_name))
}

fn can_write_logs(dir: &Path) -> bool {
    let probe = dir.join(".test_write");
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::File::create(&probe))
        .map(|_| std::fs::remove_file(&probe))
        .is_ok()
}

pub fn rotate_logs_on_startup(log_dir: &Path, service_name: &str) -> Result<(), anyhow::Error> {
    let log_path = log_dir.join(log_file_name(service_name));

    if log_path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_path = log_dir.join(format!("{service_name}.{timestamp}.log"));

        std::fs::rename(&log_path, &backup_path)?;
        info!("Previous log file backed up to: {}", backup_path.display());
    }

    Ok(())
}
