//! Data Transfer Objects for command responses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timelock::{
    format_units, refresh_error_status, FlowKind, FlowOutcome, FlowPhase, LockView,
};
use tokenlock_core::constants::TOKEN_DECIMALS;

/// One lock as rendered in the list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockViewDto {
    pub index: u64,
    pub token: String,
    /// Base units, decimal
    pub amount: String,
    /// Whole tokens, e.g. "1.5"
    pub amount_display: String,
    pub unlock_time: u64,
    /// Unlock instant in UTC; `None` when out of calendar range
    pub unlock_date: Option<String>,
    /// Countdown text, "Ready to withdraw!" or "Withdrawn"
    pub remaining: String,
    pub withdrawn: bool,
    pub withdrawable: bool,
}

impl From<&LockView> for LockViewDto {
    fn from(view: &LockView) -> Self {
        Self {
            index: view.index,
            token: view.lock.token.to_string(),
            amount: view.lock.amount.to_str_radix(10),
            amount_display: format_units(&view.lock.amount, TOKEN_DECIMALS),
            unlock_time: view.lock.unlock_time,
            unlock_date: unlock_date(view.lock.unlock_time),
            remaining: view.remaining_label.clone(),
            withdrawn: view.lock.withdrawn,
            withdrawable: view.withdrawable,
        }
    }
}

fn unlock_date(unlock_time: u64) -> Option<String> {
    let secs = i64::try_from(unlock_time).ok()?;
    let date: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
    Some(date.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Lock list response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocksResponse {
    pub locks: Vec<LockViewDto>,
    pub total_locks: usize,
    pub withdrawable_locks: usize,
    /// Store generation the list was derived from
    pub generation: u64,
    /// Set when the refresh failed; `locks` then holds the previous list
    pub status: Option<String>,
}

impl LocksResponse {
    pub fn new(views: &[LockView], generation: u64, status: Option<String>) -> Self {
        let locks: Vec<LockViewDto> = views.iter().map(LockViewDto::from).collect();
        Self {
            total_locks: locks.len(),
            withdrawable_locks: locks.iter().filter(|l| l.withdrawable).count(),
            locks,
            generation,
            status,
        }
    }
}

/// Outcome of a create or withdraw flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub flow_id: String,
    pub kind: FlowKind,
    /// Terminal phase label
    pub phase: String,
    pub succeeded: bool,
    /// One-line status text
    pub status: String,
    pub tx_hashes: Vec<String>,
    /// Set when the post-write refresh failed
    pub refresh_status: Option<String>,
}

impl FlowResponse {
    pub fn new<P: FlowPhase>(kind: FlowKind, outcome: &FlowOutcome<P>) -> Self {
        Self {
            flow_id: outcome.flow_id.to_string(),
            kind,
            phase: outcome.phase.label().to_string(),
            succeeded: !outcome.is_failed(),
            status: outcome.status.clone(),
            tx_hashes: outcome
                .receipts
                .iter()
                .map(|r| r.tx_hash.to_string())
                .collect(),
            refresh_status: match &outcome.refresh {
                Some(Err(e)) => Some(refresh_error_status(e)),
                _ => None,
            },
        }
    }
}

/// Wallet status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatusResponse {
    pub connected: bool,
    pub address: Option<String>,
}

/// Registry endpoint configuration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfigRequest {
    pub url: String,
    pub registry_address: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Registry endpoint status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatusResponse {
    pub url: String,
    pub registry_address: String,
    pub countdown_tick_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use timelock::derive_view;
    use tokenlock_core::{Address, Lock};

    fn view(unlock_time: u64, now: u64) -> LockView {
        let lock = Lock {
            token: Address::parse("0x00000000000000000000000000000000000000aa").unwrap(),
            amount: BigUint::from(1_500_000_000_000_000_000u64),
            unlock_time,
            withdrawn: false,
        };
        derive_view(2, &lock, now)
    }

    #[test]
    fn test_lock_view_dto() {
        let dto = LockViewDto::from(&view(1_700_000_000, 1_699_996_339));
        assert_eq!(dto.index, 2);
        assert_eq!(dto.amount, "1500000000000000000");
        assert_eq!(dto.amount_display, "1.5");
        assert_eq!(dto.unlock_date.as_deref(), Some("2023-11-14 22:13:20 UTC"));
        assert_eq!(dto.remaining, "1h 1m 1s");
        assert!(!dto.withdrawable);
    }

    #[test]
    fn test_unlock_date_out_of_range() {
        let dto = LockViewDto::from(&view(u64::MAX, 0));
        assert!(dto.unlock_date.is_none());
    }

    #[test]
    fn test_locks_response_counts() {
        let views = vec![view(100, 200), view(300, 200)];
        let response = LocksResponse::new(&views, 4, None);
        assert_eq!(response.total_locks, 2);
        assert_eq!(response.withdrawable_locks, 1);
        assert_eq!(response.generation, 4);
    }

    #[test]
    fn test_dto_serializes_camel_case() {
        let json = serde_json::to_value(LockViewDto::from(&view(100, 200))).unwrap();
        assert_eq!(json["amountDisplay"], "1.5");
        assert_eq!(json["withdrawable"], true);
        assert_eq!(json["remaining"], "Ready to withdraw!");
    }
}
