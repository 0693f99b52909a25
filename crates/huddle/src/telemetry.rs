//! Log output setup.

use tracing_subscriber::EnvFilter;

use crate::HuddleError;

/// Installs a `fmt` subscriber as the global default.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (e.g.
/// `"huddle=info,huddle_voice=debug"`) is used.
///
/// # Errors
/// [`HuddleError::InvalidConfig`] if the filter doesn't parse or a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), HuddleError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter)?)
        .with_target(false)
        .try_init()
        .map_err(|e| HuddleError::InvalidConfig(format!("tracing: {e}")))
}

fn env_filter(default_filter: &str) -> Result<EnvFilter, HuddleError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| HuddleError::InvalidConfig(format!("log filter: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(env_filter("huddle=info,huddle_voice=debug").is_ok());
        assert!(env_filter(&crate::ServerConfig::default().log_filter).is_ok());
    }
}
