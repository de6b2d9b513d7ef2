//! Console logging for `spm`.
//!
//! Library crates only emit `tracing` events. Install progress is carried in
//! the `event` field (`found`, `install`, `installed`, `depends`), so the
//! human format keeps fields inline and the JSON format flattens them.

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events follow `-v`.
const SPM_TARGETS: &[&str] = &["spm", "spm_core"];

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - If true, output JSON lines to stderr
///
/// `RUST_LOG` sets the baseline for other crates; the spm crates always
/// follow `verbosity`.
///
/// # Panics
/// Panics if the subscriber cannot be initialized (e.g., called twice).
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = SPM_TARGETS
        .iter()
        .filter_map(|target| format!("{target}={level}").parse::<Directive>().ok())
        .fold(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            EnvFilter::add_directive,
        );

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
