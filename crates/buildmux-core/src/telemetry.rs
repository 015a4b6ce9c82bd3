//! Global tracing subscriber for the `buildmux` binary.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber, writing to stderr so stdout carries only the
/// menu and run summary.
///
/// `RUST_LOG` wins over `level`. With `json`, each event is one JSON line.
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let events = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let events = if json {
        events.json().boxed()
    } else {
        events.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(events)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
