use std::env;

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `VAULTKEEP_LOG` takes precedence over `-v`.
/// Logs go to stderr so `--json` output on stdout stays parseable.
pub fn init(verbose: bool) {
    let default = if verbose { "vaultkeep=debug" } else { "warn" };
    let filter = env::var("VAULTKEEP_LOG")
        .ok()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
