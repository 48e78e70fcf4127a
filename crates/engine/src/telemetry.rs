//! Tracing setup for embedding binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to debug output for the
/// quizlive crates. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizlive=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
