//! Diagnostic logging to stderr.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "mailsweep=info,mailsweep_core=info,mailsweep_imap=warn";
const VERBOSE_FILTER: &str = "mailsweep=debug,mailsweep_core=debug,mailsweep_imap=info";
const TRACE_FILTER: &str = "mailsweep=debug,mailsweep_core=debug,mailsweep_imap=debug,mailsweep_oauth=debug";

/// Installs the global subscriber. `RUST_LOG` wins over `verbosity`.
pub fn init(verbosity: u8) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity).into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

const fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => VERBOSE_FILTER,
        _ => TRACE_FILTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_parse() {
        for level in 0..3 {
            assert!(EnvFilter::try_new(default_filter(level)).is_ok());
        }
        assert_eq!(default_filter(7), TRACE_FILTER);
    }
}
