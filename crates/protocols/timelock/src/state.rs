//! Derived time-lock view types

use serde::{Deserialize, Serialize};
use std::fmt;
use tokenlock_core::{Lock, LockIndex};

use crate::constants::{SECS_PER_HOUR, SECS_PER_MINUTE};

/// Remaining time until a lock matures, split into h/m/s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    pub fn from_secs(diff: u64) -> Self {
        Self {
            hours: diff / SECS_PER_HOUR,
            minutes: (diff % SECS_PER_HOUR) / SECS_PER_MINUTE,
            seconds: diff % SECS_PER_MINUTE,
        }
    }

    pub fn total_secs(&self) -> u64 {
        self.hours * SECS_PER_HOUR + self.minutes * SECS_PER_MINUTE + self.seconds
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

/// A lock as the display layer sees it at one instant.
///
/// Recomputed on every tick, never stored as ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    /// Position in the owner's lock sequence (the withdraw argument)
    pub index: LockIndex,
    pub lock: Lock,
    pub remaining_label: String,
    /// Advisory only: the registry still enforces maturity on withdraw
    pub withdrawable: bool,
}
