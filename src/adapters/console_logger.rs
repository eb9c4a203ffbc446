//! Console logging for the host binary.
//!
//! The crate logs through the `log` facade; `init` installs a
//! `tracing_subscriber` fmt layer on stderr and bridges `log` records into
//! it.  Directives come from `LEVITATOR_LOG` in `EnvFilter` syntax
//! (`debug`, `levitator::app=trace,info`, ...), defaulting to `info`.

use tracing_subscriber::EnvFilter;

pub const LEVEL_ENV: &str = "LEVITATOR_LOG";
const DEFAULT_DIRECTIVES: &str = "info";

/// Filter for `directives`; missing or unparsable input yields `info`.
pub fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install the subscriber.  Later calls are no-ops.
pub fn init() {
    let directives = std::env::var(LEVEL_ENV).ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
