// re-export for convenience
pub use slog::{Logger, debug, error, info, o, trace, warn};
use slog::{Drain, Level};

use crate::configuration::LoggingConfig;

/// Builds a root logger writing to stderr. `debug_logging` wins over `quiet`.
pub fn initialize_logger(conf: LoggingConfig) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build();
    let filter_level = if conf.debug_logging {
        Level::Trace
    } else if conf.quiet {
        Level::Error
    } else {
        Level::Warning
    };
    let drain = drain.filter_level(filter_level).fuse();

    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

/// A logger that drops everything, for contexts built without a driver.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Derives a logger tagged with the given hierarchical name.
pub fn new_sublogger<S: AsRef<str>>(parent: &Logger, source: S) -> Logger {
    parent.new(o!("source" => source.as_ref().to_string()))
}
