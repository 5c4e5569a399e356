use std::str::FromStr;

use tracing::Level;

/// Installs a fmt subscriber at `level` ("trace" to "error"; anything else
/// means info). Does nothing when a global subscriber is already set.
pub fn init_tracing(level: &str) {
    let level = Level::from_str(level.trim()).unwrap_or(Level::INFO);
    // try_init fails only when a subscriber is already installed.
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}
