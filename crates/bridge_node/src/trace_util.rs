use bridge_config::LoggingConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize the tracing subscriber. The filter comes from `RUST_LOG` when
/// set, otherwise from the config's `logging.level` directive.
pub fn configure_tracing(logging: &LoggingConfig) {
    let configured_directive = logging.level.as_deref().unwrap_or(DEFAULT_DIRECTIVE);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let fmt_layer = fmt::layer().with_target(false).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
