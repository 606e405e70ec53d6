//! Error types for Tokenlock

use thiserror::Error;

/// Core errors that can occur in Tokenlock
#[derive(Debug, Error)]
pub enum Error {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of a registry call, mapped at the client boundary.
///
/// This set is closed: every transport, wallet, or contract failure lands in
/// exactly one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No signing session is available
    #[error("Wallet not connected: {reason}")]
    Connection { reason: String },

    /// The signing party declined the request
    #[error("Request rejected by wallet: {reason}")]
    UserRejected { reason: String },

    /// The registry reverted or the call could not complete
    #[error("Registry call failed: {reason}")]
    RemoteCall { reason: String },
}

/// Local input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid unlock time: {message}")]
    InvalidUnlockTime { message: String },
}

/// Result type alias for Tokenlock operations
pub type Result<T> = std::result::Result<T, Error>;

impl RegistryError {
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    pub fn user_rejected(reason: impl Into<String>) -> Self {
        Self::UserRejected {
            reason: reason.into(),
        }
    }

    pub fn remote_call(reason: impl Into<String>) -> Self {
        Self::RemoteCall {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection_error",
            Self::UserRejected { .. } => "user_rejected",
            Self::RemoteCall { .. } => "remote_call_error",
        }
    }

    /// The underlying reason text, without the category prefix
    pub fn reason(&self) -> &str {
        match self {
            Self::Connection { reason }
            | Self::UserRejected { reason }
            | Self::RemoteCall { reason } => reason,
        }
    }
}

impl ProtocolError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::InvalidUnlockTime { .. } => "invalid_unlock_time",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_codes() {
        assert_eq!(
            RegistryError::connection("no wallet").error_code(),
            "connection_error"
        );
        assert_eq!(
            RegistryError::user_rejected("denied").error_code(),
            "user_rejected"
        );

        let err = RegistryError::remote_call("execution reverted: lock not matured");
        assert_eq!(err.error_code(), "remote_call_error");
        assert_eq!(err.reason(), "execution reverted: lock not matured");
        assert_eq!(
            err.to_string(),
            "Registry call failed: execution reverted: lock not matured"
        );
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: Error = ProtocolError::InvalidAmount {
            message: "empty".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Protocol error: Invalid amount: empty");
    }
}
