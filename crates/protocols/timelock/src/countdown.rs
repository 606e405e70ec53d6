//! Countdown derivation
//!
//! Pure functions of (locks, now). Withdrawability here only gates the
//! display-layer action; the registry remains the authority.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokenlock_core::{Lock, LockIndex, UnixSeconds};

use crate::constants::{READY_LABEL, WITHDRAWN_LABEL};
use crate::state::{Countdown, LockView};

/// Source of the current unix time
pub trait Clock: Send + Sync {
    fn now(&self) -> UnixSeconds;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixSeconds {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: UnixSeconds) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: UnixSeconds) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixSeconds {
        self.0.load(Ordering::SeqCst)
    }
}

/// Derive the view of a single lock at `now`
pub fn derive_view(index: LockIndex, lock: &Lock, now: UnixSeconds) -> LockView {
    let (remaining_label, withdrawable) = if lock.withdrawn {
        (WITHDRAWN_LABEL.to_string(), false)
    } else if lock.unlock_time <= now {
        (READY_LABEL.to_string(), true)
    } else {
        let countdown = Countdown::from_secs(lock.unlock_time - now);
        (countdown.to_string(), false)
    };

    LockView {
        index,
        lock: lock.clone(),
        remaining_label,
        withdrawable,
    }
}

/// Derive views for a whole lock sequence, preserving order and length
pub fn derive_views(locks: &[Lock], now: UnixSeconds) -> Vec<LockView> {
    locks
        .iter()
        .zip(0..)
        .map(|(lock, index)| derive_view(index, lock, now))
        .collect()
}
