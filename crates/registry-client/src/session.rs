//! Wallet session handle
//!
//! The signing identity is an injected capability: the registry client is
//! constructed with a `SessionHandle` and consults it before every call.

use std::sync::Arc;
use std::time::Instant;

use tokenlock_core::{Address, RegistryError};
use tokio::sync::RwLock;

/// A connected signing identity
#[derive(Clone, Debug)]
pub struct WalletSession {
    pub address: Address,
    /// When the wallet was connected
    pub connected_at: Instant,
}

impl WalletSession {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            connected_at: Instant::now(),
        }
    }
}

/// Shared, swappable session slot
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<WalletSession>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that starts out connected
    pub fn connected(address: Address) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(WalletSession::new(address)))),
        }
    }

    pub async fn connect(&self, address: Address) {
        tracing::info!(address = %address, "Wallet session connected");
        let mut session = self.inner.write().await;
        *session = Some(WalletSession::new(address));
    }

    pub async fn disconnect(&self) {
        let mut session = self.inner.write().await;
        if session.take().is_some() {
            tracing::info!("Wallet session disconnected");
        }
    }

    pub async fn current(&self) -> Option<WalletSession> {
        self.inner.read().await.clone()
    }

    /// Current session, or `Connection` when none is available
    pub async fn require(&self) -> Result<WalletSession, RegistryError> {
        self.current()
            .await
            .ok_or_else(|| RegistryError::connection("no wallet session, connect a wallet first"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    #[tokio::test]
    async fn test_require_without_session() {
        let handle = SessionHandle::new();
        let err = handle.require().await.unwrap_err();
        assert_eq!(err.error_code(), "connection_error");
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let handle = SessionHandle::new();
        let shared = handle.clone();

        handle.connect(owner()).await;
        assert_eq!(shared.require().await.unwrap().address, owner());

        shared.disconnect().await;
        assert!(handle.current().await.is_none());
    }
}
