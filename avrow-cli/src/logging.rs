use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Crates whose records are shown by default, everything else is held to warnings.
const LOG_TARGETS: [&str; 2] = ["avrow", "avx"];

/// Install a subscriber writing to stderr, which also receives the library's `log` records.
pub fn setup_logger(filter: EnvFilter) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

/// `RUST_LOG` if set, otherwise [`avx_filter`].
pub fn default_env_filter(is_verbose: bool) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => avx_filter(is_verbose),
    }
}

/// INFO for avrow and the tool itself, or TRACE when running verbosely.
fn avx_filter(is_verbose: bool) -> Result<EnvFilter, ParseError> {
    let level = if is_verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse(directives)
}
