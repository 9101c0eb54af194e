//! Stale unpaid digital group auto-cancellation.

use chrono::Utc;
use domain::{OrderService, cancellation_window};
use storage::MarketStore;

use crate::error::WorkerError;

/// How many stale groups one sweep handles.
const BATCH_SIZE: i64 = 50;

/// Periodically cancels pending digital groups whose payment never
/// arrived within the cancellation window.
///
/// The scan is only a candidate list; every condition is re-checked
/// under the group lock before cancelling, so a payment that lands
/// between scan and lock wins.
pub struct AutoCancel<S: MarketStore> {
    store: S,
    orders: OrderService<S>,
}

impl<S: MarketStore> AutoCancel<S> {
    /// Creates a new auto-cancel scheduler.
    pub fn new(store: S) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            store,
        }
    }

    /// Runs the scheduler until the process shuts down.
    pub async fn run(&self, poll_interval: std::time::Duration) {
        tracing::info!(?poll_interval, "auto-cancel scheduler started");
        loop {
            match self.run_once().await {
                Ok(0) => {}
                Ok(cancelled) => tracing::info!(cancelled, "auto-cancelled stale unpaid groups"),
                Err(e) => tracing::error!(error = %e, "auto-cancel sweep failed"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Sweeps once. Returns how many groups were cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize, WorkerError> {
        let cutoff = Utc::now() - cancellation_window();
        let candidates = self
            .store
            .stale_unpaid_digital_groups(cutoff, BATCH_SIZE)
            .await?;

        let mut cancelled = 0;
        for group_id in candidates {
            match self.orders.cancel_stale_group(group_id, cutoff).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(%group_id, error = %e, "stale group cancellation failed");
                }
            }
        }

        if cancelled > 0 {
            metrics::counter!("auto_cancelled_groups_total").increment(cancelled as u64);
        }
        Ok(cancelled)
    }
}
