//! Structured logging setup

use crate::config::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "mandrill_dev=info,tower_http=info";

/// Initialise the tracing subscriber.
///
/// `LOG_FORMAT=json` switches to JSON lines with event fields flattened so
/// `message` is top-level; anything else uses the human-readable formatter.
pub fn init(config: &TelemetryConfig, debug: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            "mandrill_dev=debug,tower_http=debug".into()
        } else {
            DEFAULT_FILTER.into()
        }
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format.eq_ignore_ascii_case("json") {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true);
        registry.with(fmt_layer).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
