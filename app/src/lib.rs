//! Tokenlock application library
//!
//! The boundary between the lock client and whatever renders it: shared
//! state, command functions returning DTOs or status text, and logging setup.

pub mod commands;
pub mod dto;
pub mod state;

pub use state::{AppState, LockRuntime};

/// Default log directives; `tokenlock` also covers `tokenlock_lib` and
/// `tokenlock_core`
pub const DEFAULT_LOG_DIRECTIVES: &[&str] = &[
    "info",
    "tokenlock=debug",
    "timelock=debug",
    "registry_client=debug",
];

/// Build the log filter from `RUST_LOG` plus the default directives
pub fn log_filter() -> tracing_subscriber::EnvFilter {
    DEFAULT_LOG_DIRECTIVES.iter().fold(
        tracing_subscriber::EnvFilter::from_default_env(),
        |filter, directive| match directive.parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        },
    )
}

/// Install the global tracing subscriber.
///
/// Calling this more than once is harmless.
pub fn init_tracing() {
    if tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .try_init()
        .is_ok()
    {
        tracing::info!("Starting Tokenlock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::Directive;

    #[test]
    fn test_default_directives_parse() {
        for directive in DEFAULT_LOG_DIRECTIVES {
            assert!(directive.parse::<Directive>().is_ok(), "{}", directive);
        }
    }

    #[test]
    fn test_library_crates_log_at_debug() {
        let filter = log_filter().to_string();
        for target in ["timelock=debug", "registry_client=debug", "tokenlock=debug"] {
            assert!(filter.contains(target), "{} missing from {}", target, filter);
        }
    }
}
