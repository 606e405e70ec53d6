//! Lock state store
//!
//! Holds the last successful registry read for the connected owner. The
//! stored sequence is only ever replaced wholesale by `refresh`; there is no
//! other mutation path.
//!
//! Each refresh takes a ticket from a monotonic counter before calling the
//! registry. When the result arrives it is applied only if no refresh with a
//! later ticket has been applied in the meantime, so a slow, older read can
//! never overwrite a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use registry_client::Registry;
use tokenlock_core::{Address, Lock, RegistryError};
use tokio::sync::RwLock;

/// What happened to a successful registry read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The read replaced the stored sequence
    Applied { generation: u64, count: usize },
    /// A newer read had already been applied; this one was discarded
    Superseded { ticket: u64, current: u64 },
}

#[derive(Default)]
struct Snapshot {
    /// Ticket of the refresh that produced this snapshot (0 = never loaded)
    generation: u64,
    owner: Option<Address>,
    locks: Arc<Vec<Lock>>,
}

pub struct LockStore {
    registry: Arc<dyn Registry>,
    snapshot: RwLock<Snapshot>,
    tickets: AtomicU64,
}

impl LockStore {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            snapshot: RwLock::new(Snapshot::default()),
            tickets: AtomicU64::new(0),
        }
    }

    /// Re-read `owner`'s locks and replace the stored sequence.
    ///
    /// On failure the previous contents stay in place and the error is
    /// returned to the caller.
    pub async fn refresh(&self, owner: &Address) -> Result<RefreshOutcome, RegistryError> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        let locks = match self.registry.list_locks(owner).await {
            Ok(locks) => locks,
            Err(e) => {
                tracing::warn!(owner = %owner, ticket, error = %e, "Lock refresh failed");
                return Err(e);
            }
        };

        let mut snapshot = self.snapshot.write().await;
        if ticket < snapshot.generation {
            tracing::debug!(
                ticket,
                generation = snapshot.generation,
                "Discarding stale lock refresh"
            );
            return Ok(RefreshOutcome::Superseded {
                ticket,
                current: snapshot.generation,
            });
        }

        let count = locks.len();
        *snapshot = Snapshot {
            generation: ticket,
            owner: Some(owner.clone()),
            locks: Arc::new(locks),
        };
        tracing::debug!(owner = %owner, generation = ticket, count, "Lock store refreshed");

        Ok(RefreshOutcome::Applied {
            generation: ticket,
            count,
        })
    }

    /// Current snapshot; possibly stale between refreshes
    pub async fn get(&self) -> Arc<Vec<Lock>> {
        self.snapshot.read().await.locks.clone()
    }

    /// Ticket of the refresh behind the current snapshot
    pub async fn generation(&self) -> u64 {
        self.snapshot.read().await.generation
    }

    /// Owner whose locks are currently stored
    pub async fn owner(&self) -> Option<Address> {
        self.snapshot.read().await.owner.clone()
    }
}
