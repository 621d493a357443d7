use {
    crate::Config,
    std::{io::IsTerminal, panic::PanicHookInfo, sync::Once},
    time::macros::format_description,
    tracing::Level,
    tracing_subscriber::{
        EnvFilter,
        Layer,
        fmt::{time::UtcTime, writer::MakeWriterExt as _},
        prelude::*,
        util::SubscriberInitExt,
    },
};

/// Installs the global tracing subscriber and routes panics through it.
///
/// Panics if a global subscriber is already installed.
pub fn initialize(config: &Config) {
    install_subscriber(config);
    std::panic::set_hook(Box::new(log_panic));
}

/// Like [`initialize`] with plain text output, but only the first call in a
/// process has an effect. Meant for tests, which share one process.
pub fn initialize_reentrant(env_filter: &str) {
    static INITIALIZED: Once = Once::new();
    INITIALIZED.call_once(|| initialize(&Config::with_filter(env_filter)));
}

fn install_subscriber(config: &Config) {
    let stderr_threshold = config.stderr_threshold.unwrap_or(Level::ERROR);
    let writer = std::io::stdout
        .with_min_level(stderr_threshold)
        .or_else(std::io::stderr);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_timer(UtcTime::new(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        )))
        .with_ansi(!config.use_json_format && std::io::stdout().is_terminal());
    let layer = match config.use_json_format {
        true => layer.json().boxed(),
        false => layer.boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(EnvFilter::new(&config.env_filter)))
        .init();
    tracing::info!(filter = %config.env_filter, json = config.use_json_format, "logging initialized");
}

/// Logs panics as `error` events so they keep the configured log format.
fn log_panic(panic: &PanicHookInfo) {
    let thread = std::thread::current();
    let thread = thread.name().unwrap_or("<unnamed>");
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!("thread '{thread}' {panic}\nstack backtrace:\n{backtrace}");
}
