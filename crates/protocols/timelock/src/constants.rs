//! Time-lock display markers and timing parameters

use std::time::Duration;

/// Label shown for a lock that has already been withdrawn
pub const WITHDRAWN_LABEL: &str = "Withdrawn";

/// Label shown for a matured, not yet withdrawn lock
pub const READY_LABEL: &str = "Ready to withdraw!";

/// Countdown recompute cadence
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Buffered flow events per subscriber before the slowest one lags
pub const FLOW_EVENT_CAPACITY: usize = 64;

pub const SECS_PER_MINUTE: u64 = 60;
pub const SECS_PER_HOUR: u64 = 3_600;
