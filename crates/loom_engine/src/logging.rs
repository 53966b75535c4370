//! Logger setup for binaries and tests

/// Install `env_logger`, honouring `RUST_LOG` and falling back to `default_filter`.
///
/// Returns `false` if a logger was already installed.
pub fn init(default_filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
