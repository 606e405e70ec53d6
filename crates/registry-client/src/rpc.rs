//! JSON-RPC 2.0 transport to the wallet-backed endpoint

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokenlock_core::RegistryError;

/// EIP-1193 "user rejected request"
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error object of a JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Minimal JSON-RPC client bound to one endpoint
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .user_agent("tokenlock")
            .build()
            .map_err(|e| RegistryError::remote_call(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.into(),
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one request and return its `result` (which may be `null`)
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RegistryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, id, url = %self.url, "RPC request");

        let response = timed_request(
            self.request_timeout,
            self.http.post(&self.url).json(&body).send(),
        )
        .await?;

        let status = response.status();
        let text = timed_request(self.request_timeout, response.text()).await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => parse_rpc_response(value),
            Err(_) if !status.is_success() => Err(RegistryError::remote_call(format!(
                "endpoint returned HTTP {}",
                status
            ))),
            Err(e) => Err(RegistryError::remote_call(format!(
                "failed to parse RPC response: {}",
                e
            ))),
        }
    }
}

/// Extract the result of a JSON-RPC response document
pub fn parse_rpc_response(value: Value) -> Result<Value, RegistryError> {
    let response: RpcResponse = serde_json::from_value(value)
        .map_err(|e| RegistryError::remote_call(format!("malformed RPC response: {}", e)))?;

    if let Some(err) = response.error {
        return Err(map_rpc_error(&err));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Map a JSON-RPC error object into the closed registry error set
pub fn map_rpc_error(err: &RpcErrorObject) -> RegistryError {
    let lowered = err.message.to_ascii_lowercase();
    if err.code == USER_REJECTED_CODE
        || lowered.contains("user denied")
        || lowered.contains("user rejected")
    {
        return RegistryError::user_rejected(err.message.clone());
    }

    match err.data.as_ref().and_then(|d| d.as_str()) {
        Some(data) if !err.message.contains(data) => {
            RegistryError::remote_call(format!("{} ({})", err.message, data))
        }
        _ => RegistryError::remote_call(err.message.clone()),
    }
}

/// Bound a transport future by a timeout. Both timeouts and transport
/// failures become `RemoteCall`.
async fn timed_request<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T, reqwest::Error>>,
) -> Result<T, RegistryError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| {
            RegistryError::remote_call(format!(
                "request timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            if e.is_connect() {
                RegistryError::remote_call(format!("network unreachable: {}", e))
            } else {
                RegistryError::remote_call(e.to_string())
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"});
        assert_eq!(parse_rpc_response(value).unwrap(), json!("0x10"));
    }

    #[test]
    fn test_null_result_is_not_an_error() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": null});
        assert_eq!(parse_rpc_response(value).unwrap(), Value::Null);
    }

    #[test]
    fn test_user_rejection_mapped() {
        let value = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 4001, "message": "User rejected the request."}
        });
        let err = parse_rpc_response(value).unwrap_err();
        assert_eq!(
            err,
            RegistryError::user_rejected("User rejected the request.")
        );
    }

    #[test]
    fn test_legacy_denial_message_mapped() {
        let err = map_rpc_error(&RpcErrorObject {
            code: -32000,
            message: "MetaMask Tx Signature: User denied transaction signature.".into(),
            data: None,
        });
        assert_eq!(err.error_code(), "user_rejected");
    }

    #[test]
    fn test_revert_carries_reason() {
        let err = map_rpc_error(&RpcErrorObject {
            code: 3,
            message: "execution reverted: Tokens are still locked".into(),
            data: Some(json!("0x08c379a0")),
        });
        assert_eq!(err.error_code(), "remote_call_error");
        assert_eq!(
            err.reason(),
            "execution reverted: Tokens are still locked (0x08c379a0)"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_remote_call_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = RpcClient::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        let err = client.call("eth_blockNumber", json!([])).await.unwrap_err();
        assert_eq!(err.error_code(), "remote_call_error");
    }
}
