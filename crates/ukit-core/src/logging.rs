#![forbid(unsafe_code)]

//! Structured logging.
//!
//! The toolkit emits `tracing` events and never installs a subscriber on
//! its own. Hosts either bring their own subscriber or, with the
//! `tracing-json` feature, call [`init_json`] once at startup.
//!
//! Targets used:
//!
//! | Target | Level | Event |
//! |--------|-------|-------|
//! | `ukit_core::class` | debug | class built |
//! | `ukit_view::observable` | debug | platform handler attached / detached |
//! | `ukit_view::observable` | trace | dispatch |
//! | `ukit_view::observable` | warn | callback failed under the isolating policy |

pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,ukit_core=info,ukit_view=info";

/// Install a JSON subscriber on stderr filtered by `RUST_LOG`
/// (falling back to [`DEFAULT_FILTER`]).
///
/// Returns an error if a global subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
}
