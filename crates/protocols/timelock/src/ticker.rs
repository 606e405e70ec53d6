//! Periodic countdown recomputation
//!
//! A background task re-derives lock views on a fixed cadence and publishes
//! them on a watch channel. Every tick reads the store's current snapshot,
//! never a captured copy, so a refresh shows up on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::countdown::{derive_views, Clock};
use crate::state::LockView;
use crate::store::LockStore;

pub struct CountdownTicker;

impl CountdownTicker {
    /// Start ticking. The first views are published immediately.
    ///
    /// The task stops when the handle is cancelled or dropped, or when every
    /// receiver is gone.
    pub fn spawn(
        store: Arc<LockStore>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> (CountdownHandle, watch::Receiver<Vec<LockView>>) {
        let (views_tx, views_rx) = watch::channel(Vec::new());
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel_rx => break,
                    _ = interval.tick() => {
                        let locks = store.get().await;
                        let views = derive_views(&locks, clock.now());
                        if views_tx.send(views).is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Countdown ticker stopped");
        });

        let handle = CountdownHandle {
            cancel: Some(cancel_tx),
            task: Some(task),
        };
        (handle, views_rx)
    }
}

/// Owner of a running ticker. Dropping it stops the ticker.
pub struct CountdownHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    /// Stop the ticker and wait for its task to finish
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Countdown ticker task failed: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}
