use tokenlock_core::RpcConfig;

use crate::dto::{RegistryConfigRequest, RegistryStatusResponse};
use crate::state::AppState;

/// Get the configured registry endpoint
pub async fn get_registry_status(state: &AppState) -> Result<RegistryStatusResponse, String> {
    let config = state.config().await;
    Ok(RegistryStatusResponse {
        url: config.rpc.url,
        registry_address: config.rpc.registry_address,
        countdown_tick_ms: config.countdown_tick_ms,
    })
}

/// Point the client at a registry endpoint
pub async fn configure_registry(
    state: &AppState,
    request: RegistryConfigRequest,
) -> Result<RegistryStatusResponse, String> {
    let defaults = RpcConfig::default();
    let rpc = RpcConfig {
        url: request.url,
        registry_address: request.registry_address,
        request_timeout_secs: request
            .request_timeout_secs
            .unwrap_or(defaults.request_timeout_secs),
    };
    state.set_rpc_config(rpc).await.map_err(|e| e.to_string())?;

    get_registry_status(state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configure_registry() {
        let state = AppState::new();
        let status = configure_registry(
            &state,
            RegistryConfigRequest {
                url: "http://10.0.0.2:8545".to_string(),
                registry_address: "0x00000000000000000000000000000000000000EE".to_string(),
                request_timeout_secs: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(status.url, "http://10.0.0.2:8545");
        assert_eq!(status.countdown_tick_ms, 1_000);
        assert_eq!(state.config().await.rpc.request_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_configure_registry_rejects_bad_address() {
        let state = AppState::new();
        let err = configure_registry(
            &state,
            RegistryConfigRequest {
                url: "http://10.0.0.2:8545".to_string(),
                registry_address: "registry".to_string(),
                request_timeout_secs: Some(5),
            },
        )
        .await
        .unwrap_err();

        assert!(err.contains("Invalid address"), "{}", err);
    }
}
