use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_subscriber::filter::LevelFilter;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Keeps the non-blocking file writer flushing until dropped.
#[allow(dead_code)]
pub struct LoggerGuard(WorkerGuard);

fn parse_level(level: &str) -> LevelFilter {
    match level {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", level);
            LevelFilter::INFO
        }
    }
}

/// Console + daily rolling file logging. `RUST_LOG` refines the configured level.
/// Rolled files older than `retention` are swept hourly, so this must be
/// called from within a tokio runtime.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    prefix: &str,
    level: &str,
    retention: Duration,
) -> anyhow::Result<LoggerGuard> {
    let log_dir = log_dir.as_ref().to_path_buf();

    let builder = EnvFilter::builder().with_default_directive(parse_level(level).into());
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();

    let console_filter = builder.clone().parse_lossy(&rust_log);
    let file_filter = builder.parse_lossy(&rust_log);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create file appender in {:?}: {}", log_dir, e))?;
    let (non_blocking, guard) = NonBlocking::new(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(file_filter);
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    let sweeper = LogSweeper {
        dir: log_dir,
        prefix: prefix.to_string(),
        retention,
    };
    tokio::spawn(sweeper.run());

    Ok(LoggerGuard(guard))
}

/// Deletes this process's rolled log files once they outlive `retention`
struct LogSweeper {
    dir: PathBuf,
    prefix: String,
    retention: Duration,
}

impl LogSweeper {
    async fn run(self) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match self.sweep() {
                Ok(0) => {}
                Ok(n) => tracing::info!("Removed {} expired log file(s) from {:?}", n, self.dir),
                Err(e) => tracing::warn!("Log sweep in {:?} failed: {}", self.dir, e),
            }
        }
    }

    fn owns(&self, name: &str) -> bool {
        name.starts_with(&self.prefix) && name.ends_with(".log")
    }

    /// Files this sweeper owns whose mtime is past retention as of `now`.
    fn expired(&self, now: SystemTime) -> std::io::Result<Vec<PathBuf>> {
        let mut expired = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_name().to_str().is_some_and(|name| self.owns(name)) {
                continue;
            }
            let Ok(modified) = entry.metadata()?.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > self.retention {
                expired.push(entry.path());
            }
        }
        Ok(expired)
    }

    /// A file that vanishes between listing and removal is not an error.
    fn sweep(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for path in self.expired(SystemTime::now())? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}
