use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

pub const DEFAULT_LOG_DIRECTIVE: &str = "lifelog=info";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `directive` (or [`DEFAULT_LOG_DIRECTIVE`]) applies.
/// An unparsable directive falls back to the default.
pub fn init_tracing(directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_DIRECTIVE))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
        });

        // A subscriber installed by the host application is left in place.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
