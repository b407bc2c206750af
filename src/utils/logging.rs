use std::env;
use std::fs;
use std::path::Path;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,avatar_sprites=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize logging to the console and, optionally, to a session log file.
///
/// The log file is truncated on startup. Calling this more than once, or after
/// another subscriber was installed, leaves the existing subscriber in place.
pub fn init_logging(log_file: Option<&Path>) {
    let file_layer = log_file.and_then(|path| match fs::File::create(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false) // No ANSI codes in file
                .boxed(),
        ),
        Err(e) => {
            eprintln!("Warning: Failed to create log file {}: {}", path.display(), e);
            None
        }
    });

    let result = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(file_layer)
        .try_init();

    if result.is_ok() {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        tracing::info!("Logging initialized with filter: {}", level);
        if let Some(path) = log_file {
            tracing::info!("File logging enabled: {}", path.display());
        }
    }
}
