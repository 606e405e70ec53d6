//! Lock lifecycle coordinator
//!
//! Two write flows, each driven by its own state machine instance:
//! 1. Create:   Idle → Authorizing → Authorized → Locking → Locked
//! 2. Withdraw: Idle → Withdrawing → Withdrawn
//!
//! Either may end in Failed from any non-terminal phase. A flow keeps no
//! state once it has reported its outcome, and nothing is retried
//! automatically.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use registry_client::Registry;
use serde::{Deserialize, Serialize};
use tokenlock_core::{Address, LockIndex, RegistryError, TxReceipt, UnixSeconds};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::FLOW_EVENT_CAPACITY;
use crate::store::{LockStore, RefreshOutcome};

// =============================================================================
// Phases
// =============================================================================

/// Common behaviour of flow phases
pub trait FlowPhase: Clone + fmt::Debug + PartialEq + Send {
    fn idle() -> Self;
    fn failed(message: String) -> Self;
    fn label(&self) -> &'static str;
    fn is_terminal(&self) -> bool;
    fn is_failed(&self) -> bool;
    fn can_advance_to(&self, next: &Self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "message", rename_all = "camelCase")]
pub enum CreatePhase {
    Idle,
    Authorizing,
    Authorized,
    Locking,
    Locked,
    Failed(String),
}

impl FlowPhase for CreatePhase {
    fn idle() -> Self {
        Self::Idle
    }

    fn failed(message: String) -> Self {
        Self::Failed(message)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Authorizing => "authorizing",
            Self::Authorized => "authorized",
            Self::Locking => "locking",
            Self::Locked => "locked",
            Self::Failed(_) => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Locked | Self::Failed(_))
    }

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn can_advance_to(&self, next: &Self) -> bool {
        match (self, next) {
            (from, Self::Failed(_)) => !from.is_terminal(),
            (Self::Idle, Self::Authorizing)
            | (Self::Authorizing, Self::Authorized)
            | (Self::Authorized, Self::Locking)
            | (Self::Locking, Self::Locked) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "message", rename_all = "camelCase")]
pub enum WithdrawPhase {
    Idle,
    Withdrawing,
    Withdrawn,
    Failed(String),
}

impl FlowPhase for WithdrawPhase {
    fn idle() -> Self {
        Self::Idle
    }

    fn failed(message: String) -> Self {
        Self::Failed(message)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Withdrawing => "withdrawing",
            Self::Withdrawn => "withdrawn",
            Self::Failed(_) => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Withdrawn | Self::Failed(_))
    }

    fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn can_advance_to(&self, next: &Self) -> bool {
        match (self, next) {
            (from, Self::Failed(_)) => !from.is_terminal(),
            (Self::Idle, Self::Withdrawing) | (Self::Withdrawing, Self::Withdrawn) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Events and outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    Create,
    Withdraw,
}

/// Phase change broadcast to display-layer subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEvent {
    pub flow_id: Uuid,
    pub kind: FlowKind,
    pub phase: &'static str,
    /// Set on terminal phases
    pub status: Option<String>,
}

/// Result of one user-initiated flow
#[derive(Debug, Clone)]
pub struct FlowOutcome<P> {
    pub flow_id: Uuid,
    /// Terminal phase the flow ended in
    pub phase: P,
    /// One-line status text for the display layer
    pub status: String,
    /// Receipts of confirmed writes, in order
    pub receipts: Vec<TxReceipt>,
    /// Post-write store refresh; `None` when the flow failed before it
    pub refresh: Option<Result<RefreshOutcome, RegistryError>>,
}

impl<P: FlowPhase> FlowOutcome<P> {
    pub fn is_failed(&self) -> bool {
        self.phase.is_failed()
    }
}

/// Parameters of a create flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLockRequest {
    pub token: Address,
    /// Base units
    pub amount: BigUint,
    /// Passed through unvalidated; a past time yields an immediately
    /// withdrawable lock
    pub unlock_time: UnixSeconds,
}

// =============================================================================
// Flow state machine
// =============================================================================

struct FlowMachine<P: FlowPhase> {
    id: Uuid,
    kind: FlowKind,
    phase: P,
    events: broadcast::Sender<FlowEvent>,
}

impl<P: FlowPhase> FlowMachine<P> {
    fn new(kind: FlowKind, events: broadcast::Sender<FlowEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            phase: P::idle(),
            events,
        }
    }

    fn advance(&mut self, next: P) {
        self.transition(next, None);
    }

    fn transition(&mut self, next: P, status: Option<String>) {
        debug_assert!(
            self.phase.can_advance_to(&next),
            "illegal {:?} flow transition {:?} -> {:?}",
            self.kind,
            self.phase,
            next
        );
        tracing::debug!(
            flow_id = %self.id,
            from = self.phase.label(),
            to = next.label(),
            "Flow transition"
        );
        self.phase = next;

        // No subscribers is fine
        let _ = self.events.send(FlowEvent {
            flow_id: self.id,
            kind: self.kind,
            phase: self.phase.label(),
            status,
        });
    }

    /// Enter a terminal phase, report it, and reset to Idle
    fn finish(
        &mut self,
        terminal: P,
        status: String,
        receipts: Vec<TxReceipt>,
        refresh: Option<Result<RefreshOutcome, RegistryError>>,
    ) -> FlowOutcome<P> {
        self.transition(terminal, Some(status.clone()));
        let phase = std::mem::replace(&mut self.phase, P::idle());
        FlowOutcome {
            flow_id: self.id,
            phase,
            status,
            receipts,
            refresh,
        }
    }

    fn fail(&mut self, status: String, receipts: Vec<TxReceipt>) -> FlowOutcome<P> {
        tracing::warn!(flow_id = %self.id, kind = ?self.kind, status = %status, "Flow failed");
        self.finish(P::failed(status.clone()), status, receipts, None)
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct LockCoordinator {
    registry: Arc<dyn Registry>,
    store: Arc<LockStore>,
    events: broadcast::Sender<FlowEvent>,
}

impl LockCoordinator {
    pub fn new(registry: Arc<dyn Registry>, store: Arc<LockStore>) -> Self {
        let (events, _) = broadcast::channel(FLOW_EVENT_CAPACITY);
        Self {
            registry,
            store,
            events,
        }
    }

    pub fn store(&self) -> &Arc<LockStore> {
        &self.store
    }

    /// Receive phase changes of every flow started after subscribing
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Authorize the registry to pull the funds, then create the lock.
    ///
    /// The lock is only attempted once the authorization is confirmed. If the
    /// lock call then fails the authorization stays in place; revoking it is
    /// a separate user action.
    pub async fn create_lock(&self, request: CreateLockRequest) -> FlowOutcome<CreatePhase> {
        let mut flow = FlowMachine::new(FlowKind::Create, self.events.clone());
        let mut receipts = Vec::new();
        let spender = self.registry.registry_address().clone();

        flow.advance(CreatePhase::Authorizing);
        match self
            .registry
            .authorize_transfer(&request.token, &spender, &request.amount)
            .await
        {
            Ok(receipt) => receipts.push(receipt),
            Err(e) => return flow.fail(create_error_status(&e), receipts),
        }
        flow.advance(CreatePhase::Authorized);

        flow.advance(CreatePhase::Locking);
        match self
            .registry
            .create_lock(&request.token, &request.amount, request.unlock_time)
            .await
        {
            Ok(receipt) => receipts.push(receipt),
            Err(e) => {
                tracing::warn!(
                    flow_id = %flow.id,
                    token = %request.token,
                    "Lock failed after authorization; the authorization remains granted"
                );
                return flow.fail(create_error_status(&e), receipts);
            }
        }

        let refresh = self.refresh_after_write().await;
        tracing::info!(
            flow_id = %flow.id,
            token = %request.token,
            unlock_time = request.unlock_time,
            "Lock created"
        );
        flow.finish(
            CreatePhase::Locked,
            "Lock successful!".to_string(),
            receipts,
            Some(refresh),
        )
    }

    /// Withdraw the lock at `index`.
    ///
    /// No local maturity check: the registry decides, and a premature call
    /// simply comes back as a failed flow.
    pub async fn withdraw(&self, index: LockIndex) -> FlowOutcome<WithdrawPhase> {
        let mut flow = FlowMachine::new(FlowKind::Withdraw, self.events.clone());

        flow.advance(WithdrawPhase::Withdrawing);
        let receipt = match self.registry.withdraw(index).await {
            Ok(receipt) => receipt,
            Err(e) => return flow.fail(format!("Withdraw error: {}", e), Vec::new()),
        };

        let refresh = self.refresh_after_write().await;
        tracing::info!(flow_id = %flow.id, index, "Lock withdrawn");
        flow.finish(
            WithdrawPhase::Withdrawn,
            format!("Lock {} withdrawn!", index),
            vec![receipt],
            Some(refresh),
        )
    }

    async fn refresh_after_write(&self) -> Result<RefreshOutcome, RegistryError> {
        let owner = self.registry.account().await?;
        self.store.refresh(&owner).await
    }
}

fn create_error_status(err: &RegistryError) -> String {
    format!("Error: {}", err)
}

/// Status text for a failed store refresh
pub fn refresh_error_status(err: &RegistryError) -> String {
    format!("Error fetching locks: {}", err)
}
