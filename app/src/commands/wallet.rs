use crate::dto::WalletStatusResponse;
use crate::state::AppState;

/// Get wallet connection status
pub async fn get_wallet_status(state: &AppState) -> Result<WalletStatusResponse, String> {
    let wallet = state.wallet().await;

    Ok(WalletStatusResponse {
        connected: wallet.is_some(),
        address: wallet.map(|w| w.address.to_string()),
    })
}

/// Connect a known account address
pub async fn connect_wallet(
    state: &AppState,
    address: String,
) -> Result<WalletStatusResponse, String> {
    state
        .connect_wallet(&address)
        .await
        .map_err(|e| e.to_string())?;

    get_wallet_status(state).await
}

/// Ask the endpoint's wallet for an account and connect it
pub async fn request_wallet_accounts(state: &AppState) -> Result<WalletStatusResponse, String> {
    state.request_accounts().await.map_err(|e| e.to_string())?;

    get_wallet_status(state).await
}

/// Disconnect wallet
pub async fn disconnect_wallet(state: &AppState) -> Result<(), String> {
    state.disconnect_wallet().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_then_status() {
        let state = AppState::new();
        let status = connect_wallet(
            &state,
            "0x1111111111111111111111111111111111111111".to_string(),
        )
        .await
        .unwrap();
        assert!(status.connected);
        assert_eq!(
            status.address.as_deref(),
            Some("0x1111111111111111111111111111111111111111")
        );

        disconnect_wallet(&state).await.unwrap();
        assert!(!get_wallet_status(&state).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_connect_invalid_address() {
        let state = AppState::new();
        assert!(connect_wallet(&state, "0xzz".to_string()).await.is_err());
        assert!(!get_wallet_status(&state).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_request_accounts_without_endpoint_config() {
        let state = AppState::new();
        let err = request_wallet_accounts(&state).await.unwrap_err();
        assert!(err.contains("Invalid address"), "{}", err);
    }
}
