// Tracing subscriber setup shared by the CLI and the C ABI.
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "MANGO_LOG";

/// Installs a stderr `fmt` subscriber. `MANGO_LOG` wins over `default_filter`;
/// a second call (or a host that installed its own subscriber) is a no-op.
pub fn init(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
