//! Logging setup for the binary.

use std::env;
use std::io::IsTerminal;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber writing to stderr.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(config.logging.level);

    let format = match config.logging.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let fmt_layer = match format {
        LogFormat::Json => fmt_layer.json().flatten_event(true).boxed(),
        LogFormat::Simplified => fmt_layer.with_ansi(false).compact().boxed(),
        LogFormat::Pretty | LogFormat::Auto => fmt_layer.boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(level))
        .with(env_filter)
        .init();
}

/// Resolves the effective log level and per-crate filter.
///
/// A plain level in `RUST_LOG` replaces `default`. Any other value is used literally as filter
/// directive.
pub fn parse_rust_log(default: LevelFilter) -> (LevelFilter, EnvFilter) {
    // Try to parse RUST_LOG as a simple level filter and apply default levels internally.
    // Otherwise, use it literally if the user knows which overrides they want to run.
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => LevelFilter::from(level),
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => default,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        hyper=WARN,\
        reqwest=WARN,\
        loadgen=TRACE,\
        loadgen_workload=TRACE,\
        ",
    );

    (level, env_filter)
}
