//! Tracing initialization for embedders and tests.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Set to `json` for one JSON object per log line instead of the compact format.
pub const LOG_FORMAT_ENV: &str = "CHAT_ARCHIVE_SEARCH_LOG_FORMAT";

static INIT: Once = Once::new();

/// Installs a global subscriber writing to stderr. Safe to call multiple times.
///
/// The level comes from `RUST_LOG`, defaulting to `info` (`debug` under the test
/// harness, where output goes through the test writer instead).
pub fn init() {
    INIT.call_once(|| {
        let is_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let default_level = if is_test {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();
        let json = wants_json(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::NONE);

        let installed = match (is_test, json) {
            (true, _) => builder.with_test_writer().compact().try_init(),
            (false, true) => builder.with_writer(std::io::stderr).json().try_init(),
            (false, false) => builder.with_writer(std::io::stderr).compact().try_init(),
        };
        if let Err(e) = installed {
            // Another subscriber is already installed, typically by the embedding application
            eprintln!("Failed to initialize tracing: {}", e);
        }
    });
}

/// Whether the `LOG_FORMAT_ENV` value selects JSON lines.
fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}
