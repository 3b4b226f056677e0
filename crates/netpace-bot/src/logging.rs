//! Tracing subscriber setup for the `bot` binary.

use tracing_subscriber::EnvFilter;

/// How the subscriber should be configured.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Explicit level or filter directive; wins over the config's debug flag.
    pub level: Option<String>,
    pub json: bool,
}

impl LogOptions {
    /// `RUST_LOG` first, then the explicit level, then `debug` or `info`.
    pub fn filter(&self, debug: bool) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive(debug)))
    }

    fn directive(&self, debug: bool) -> String {
        match &self.level {
            Some(level) => level.clone(),
            None if debug => "debug".to_string(),
            None => "info".to_string(),
        }
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(options: &LogOptions, debug: bool) {
    let filter = options.filter(debug);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
