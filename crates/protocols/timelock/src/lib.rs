//! Token time-lock lifecycle
//!
//! Keeps the connected owner's locks in a refresh-only store, derives
//! countdowns and withdrawability from wall-clock time, and sequences the
//! authorize-then-lock and withdraw write flows against the registry.

pub mod constants;
pub mod coordinator;
pub mod countdown;
pub mod state;
pub mod store;
pub mod ticker;
pub mod units;

pub use constants::{READY_LABEL, WITHDRAWN_LABEL};
pub use coordinator::{
    refresh_error_status, CreateLockRequest, CreatePhase, FlowEvent, FlowKind, FlowOutcome,
    FlowPhase, LockCoordinator, WithdrawPhase,
};
pub use countdown::{derive_view, derive_views, Clock, ManualClock, SystemClock};
pub use state::{Countdown, LockView};
pub use store::{LockStore, RefreshOutcome};
pub use ticker::{CountdownHandle, CountdownTicker};
pub use units::{format_units, parse_lock_amount, parse_units};
