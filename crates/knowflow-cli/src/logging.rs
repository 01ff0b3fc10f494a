use crate::cli::LogLevel;
use knowflow_config::{LogFormat, LoggingConfig};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Pick the filter: `--log-level`, then `--verbose`, then `RUST_LOG`, then the config file
pub fn build_filter(
    log_level: Option<LogLevel>,
    verbose: bool,
    config: &LoggingConfig,
) -> EnvFilter {
    let explicit = log_level.or(verbose.then_some(LogLevel::Debug));
    if let Some(level) = explicit {
        return EnvFilter::default().add_directive(LevelFilter::from(level).into());
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level()))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber; logs go to stderr so stdout stays parseable
pub fn init(log_level: Option<LogLevel>, verbose: bool, config: &LoggingConfig) {
    let filter = build_filter(log_level, verbose, config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
