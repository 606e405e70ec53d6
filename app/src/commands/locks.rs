use timelock::{
    derive_views, parse_lock_amount, refresh_error_status, CreateLockRequest, FlowEvent, FlowKind,
    LockView,
};
use tokenlock_core::constants::TOKEN_DECIMALS;
use tokenlock_core::{Address, LockIndex, ProtocolError, UnixSeconds};
use tokio::sync::{broadcast, watch};

use crate::dto::{FlowResponse, LocksResponse};
use crate::state::AppState;

/// Re-read the connected owner's locks and return the derived list.
///
/// A failed read keeps the previous list and reports the error in `status`.
pub async fn fetch_locks(state: &AppState) -> Result<LocksResponse, String> {
    let runtime = state.runtime().await.map_err(|e| e.to_string())?;

    let refreshed = match runtime.registry.account().await {
        Ok(owner) => runtime.store.refresh(&owner).await,
        Err(e) => Err(e),
    };
    let status = refreshed.err().map(|e| refresh_error_status(&e));

    let locks = runtime.store.get().await;
    let views = derive_views(&locks, state.clock().now());
    Ok(LocksResponse::new(
        &views,
        runtime.store.generation().await,
        status,
    ))
}

/// Derive the list from the stored locks without contacting the registry
pub async fn get_locks(state: &AppState) -> Result<LocksResponse, String> {
    let runtime = state.runtime().await.map_err(|e| e.to_string())?;
    let locks = runtime.store.get().await;
    let views = derive_views(&locks, state.clock().now());
    Ok(LocksResponse::new(
        &views,
        runtime.store.generation().await,
        None,
    ))
}

/// Authorize and create a lock from form input.
///
/// Bad input is rejected before any registry call. A flow that reaches the
/// registry always returns `Ok`; check `succeeded` and `status`.
pub async fn create_lock(
    state: &AppState,
    token: String,
    amount: String,
    unlock_time: String,
) -> Result<FlowResponse, String> {
    let request = CreateLockRequest {
        token: Address::parse(&token).map_err(|e| e.to_string())?,
        amount: parse_lock_amount(&amount, TOKEN_DECIMALS).map_err(|e| e.to_string())?,
        unlock_time: parse_unlock_time(&unlock_time).map_err(|e| e.to_string())?,
    };

    let runtime = state.runtime().await.map_err(|e| e.to_string())?;
    let outcome = runtime.coordinator.create_lock(request).await;
    Ok(FlowResponse::new(FlowKind::Create, &outcome))
}

/// Withdraw the lock at `index`
pub async fn withdraw_lock(state: &AppState, index: LockIndex) -> Result<FlowResponse, String> {
    let runtime = state.runtime().await.map_err(|e| e.to_string())?;
    let outcome = runtime.coordinator.withdraw(index).await;
    Ok(FlowResponse::new(FlowKind::Withdraw, &outcome))
}

/// Subscribe to flow phase changes
pub async fn subscribe_flow_events(
    state: &AppState,
) -> Result<broadcast::Receiver<FlowEvent>, String> {
    let runtime = state.runtime().await.map_err(|e| e.to_string())?;
    Ok(runtime.coordinator.subscribe())
}

/// Subscribe to the once-per-tick lock views
pub async fn start_countdown(state: &AppState) -> Result<watch::Receiver<Vec<LockView>>, String> {
    state.start_countdown().await.map_err(|e| e.to_string())
}

/// Stop the countdown when the lock list is closed
pub async fn stop_countdown(state: &AppState) -> Result<(), String> {
    state.stop_countdown().await;
    Ok(())
}

/// Unlock time from the form: a positive integer of Unix seconds
fn parse_unlock_time(input: &str) -> Result<UnixSeconds, ProtocolError> {
    let input = input.trim();
    let secs: UnixSeconds = input.parse().map_err(|_| ProtocolError::InvalidUnlockTime {
        message: format!("{:?} is not a whole number of seconds", input),
    })?;
    if secs == 0 {
        return Err(ProtocolError::InvalidUnlockTime {
            message: "unlock time must be greater than zero".to_string(),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use registry_client::memory::{MemoryRegistry, Operation};
    use std::sync::Arc;
    use timelock::ManualClock;
    use tokenlock_core::{AppConfig, RegistryError};

    const TOKEN: &str = "0x00000000000000000000000000000000000000aa";

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; Address::LEN];
        bytes[Address::LEN - 1] = last;
        Address::from_bytes(bytes)
    }

    fn setup(now: u64) -> (Arc<MemoryRegistry>, Arc<ManualClock>, AppState) {
        let registry = Arc::new(MemoryRegistry::with_account(addr(0xee), addr(1)));
        registry.set_now(now);
        let clock = Arc::new(ManualClock::new(now));
        let state = AppState::with_registry(AppConfig::default(), registry.clone(), clock.clone());
        (registry, clock, state)
    }

    #[test]
    fn test_parse_unlock_time() {
        assert_eq!(parse_unlock_time(" 1700000000 ").unwrap(), 1_700_000_000);
        for bad in ["", "0", "-5", "1.5", "soon"] {
            let err = parse_unlock_time(bad).unwrap_err();
            assert_eq!(err.error_code(), "invalid_unlock_time", "input {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (registry, _clock, state) = setup(1_000);

        let response = create_lock(
            &state,
            TOKEN.to_string(),
            "1.5".to_string(),
            "4600".to_string(),
        )
        .await
        .unwrap();
        assert!(response.succeeded);
        assert_eq!(response.status, "Lock successful!");
        assert_eq!(response.phase, "locked");
        assert_eq!(response.tx_hashes.len(), 2);
        assert!(response.refresh_status.is_none());

        let stored = registry.locks_of(&addr(1));
        assert_eq!(
            stored[0].amount,
            BigUint::from(1_500_000_000_000_000_000u64)
        );

        let list = get_locks(&state).await.unwrap();
        assert_eq!(list.total_locks, 1);
        assert_eq!(list.locks[0].amount_display, "1.5");
        assert_eq!(list.locks[0].remaining, "1h 0m 0s");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input_before_registry() {
        let (registry, _clock, state) = setup(1_000);

        let zero = create_lock(&state, TOKEN.to_string(), "0".to_string(), "2000".to_string())
            .await
            .unwrap_err();
        assert!(zero.contains("Invalid amount"), "{}", zero);

        let time = create_lock(&state, TOKEN.to_string(), "1".to_string(), "later".to_string())
            .await
            .unwrap_err();
        assert!(time.contains("Invalid unlock time"), "{}", time);

        let token = create_lock(&state, "0xaa".to_string(), "1".to_string(), "2000".to_string())
            .await
            .unwrap_err();
        assert!(token.contains("Invalid address"), "{}", token);

        assert_eq!(registry.calls(Operation::AuthorizeTransfer), 0);
    }

    #[tokio::test]
    async fn test_rejected_authorization_reports_status() {
        let (registry, _clock, state) = setup(1_000);
        registry.fail_next(
            Operation::AuthorizeTransfer,
            RegistryError::user_rejected("user denied transaction signature"),
        );

        let response = create_lock(&state, TOKEN.to_string(), "2".to_string(), "2000".to_string())
            .await
            .unwrap();
        assert!(!response.succeeded);
        assert_eq!(response.phase, "failed");
        assert!(response.status.starts_with("Error: "), "{}", response.status);
        assert_eq!(registry.calls(Operation::CreateLock), 0);
    }

    #[tokio::test]
    async fn test_withdraw_after_maturity() {
        let (registry, clock, state) = setup(1_000);
        create_lock(&state, TOKEN.to_string(), "1".to_string(), "1500".to_string())
            .await
            .unwrap();

        let early = withdraw_lock(&state, 0).await.unwrap();
        assert!(!early.succeeded);
        assert!(early.status.starts_with("Withdraw error: "), "{}", early.status);

        registry.set_now(1_500);
        clock.set(1_500);
        assert!(get_locks(&state).await.unwrap().locks[0].withdrawable);

        let response = withdraw_lock(&state, 0).await.unwrap();
        assert!(response.succeeded);
        assert_eq!(response.status, "Lock 0 withdrawn!");

        let list = get_locks(&state).await.unwrap();
        assert_eq!(list.locks[0].remaining, "Withdrawn");
        assert!(!list.locks[0].withdrawable);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_list() {
        let (registry, _clock, state) = setup(1_000);
        create_lock(&state, TOKEN.to_string(), "1".to_string(), "5000".to_string())
            .await
            .unwrap();

        registry.fail_next(
            Operation::ListLocks,
            RegistryError::remote_call("network unreachable"),
        );
        let list = fetch_locks(&state).await.unwrap();
        assert_eq!(list.total_locks, 1);
        assert_eq!(
            list.status.as_deref(),
            Some("Error fetching locks: Registry call failed: network unreachable")
        );

        let list = fetch_locks(&state).await.unwrap();
        assert!(list.status.is_none());
    }

    #[tokio::test]
    async fn test_fetch_without_wallet() {
        let (registry, _clock, state) = setup(1_000);
        registry.set_account(None);

        let list = fetch_locks(&state).await.unwrap();
        assert_eq!(list.total_locks, 0);
        let status = list.status.unwrap();
        assert!(status.starts_with("Error fetching locks: Wallet not connected"), "{}", status);
    }

    #[tokio::test]
    async fn test_flow_events_are_published() {
        let (_registry, _clock, state) = setup(1_000);
        let mut events = subscribe_flow_events(&state).await.unwrap();

        let response = withdraw_lock(&state, 7).await.unwrap();
        assert!(!response.succeeded);

        let first = events.recv().await.unwrap();
        assert_eq!(first.phase, "withdrawing");
        assert_eq!(first.flow_id.to_string(), response.flow_id);
        let last = events.recv().await.unwrap();
        assert_eq!(last.phase, "failed");
        assert_eq!(last.status.as_deref(), Some(response.status.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_follows_clock() {
        let (_registry, clock, state) = setup(1_000);
        create_lock(&state, TOKEN.to_string(), "1".to_string(), "1002".to_string())
            .await
            .unwrap();

        let mut views = start_countdown(&state).await.unwrap();
        views.changed().await.unwrap();
        assert_eq!(views.borrow_and_update()[0].remaining_label, "0h 0m 2s");

        clock.advance(2);
        views.changed().await.unwrap();
        assert!(views.borrow_and_update()[0].withdrawable);

        stop_countdown(&state).await.unwrap();
    }
}
