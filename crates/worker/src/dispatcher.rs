//! Outbox task dispatcher.

use chrono::{Duration, Utc};
use payment::{PaymentGateway, PaymentService};
use storage::{MarketStore, OutboxTask, TaskPayload};

use crate::error::WorkerError;
use crate::restock;

/// A task is buried after this many claims.
pub const MAX_ATTEMPTS: i32 = 5;

/// Base delay of the exponential backoff between attempts.
const BASE_BACKOFF_SECS: i64 = 30;

/// How many tasks one drain pass claims.
const BATCH_SIZE: i64 = 20;

/// Polls the transactional outbox and executes claimed tasks.
///
/// Transient failures are rescheduled with exponential backoff; a task
/// that exhausts [`MAX_ATTEMPTS`] (or fails non-retryably) is buried
/// with its error preserved, never silently dropped. State the task was
/// meant to change is left unresolved rather than guessed at.
pub struct Dispatcher<S: MarketStore, G: PaymentGateway> {
    store: S,
    payments: PaymentService<S, G>,
}

impl<S: MarketStore, G: PaymentGateway> Dispatcher<S, G> {
    /// Creates a new dispatcher.
    pub fn new(store: S, payments: PaymentService<S, G>) -> Self {
        Self { store, payments }
    }

    /// Runs the dispatcher until the process shuts down.
    pub async fn run(&self, poll_interval: std::time::Duration) {
        tracing::info!(?poll_interval, "outbox dispatcher started");
        loop {
            match self.drain_once().await {
                Ok(0) => {}
                Ok(executed) => tracing::debug!(executed, "outbox drain pass complete"),
                Err(e) => tracing::error!(error = %e, "outbox drain pass failed"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Claims and executes every due task once. Returns how many tasks
    /// were claimed.
    pub async fn drain_once(&self) -> Result<usize, WorkerError> {
        let tasks = self.store.claim_due_tasks(Utc::now(), BATCH_SIZE).await?;
        let claimed = tasks.len();
        for task in tasks {
            self.execute(task).await;
        }
        Ok(claimed)
    }

    async fn execute(&self, task: OutboxTask) {
        metrics::counter!("outbox_tasks_executed_total", "kind" => task.payload.kind())
            .increment(1);

        let result: Result<(), WorkerError> = match &task.payload {
            TaskPayload::Restock { order_id } => restock::restock_order(&self.store, *order_id)
                .await
                .map(|_| ()),
            TaskPayload::VerifyPayment { reference } => {
                self.payments.verify(reference).await.map(|_| ()).map_err(WorkerError::from)
            }
        };

        let error = match result {
            Ok(()) => {
                if let Err(e) = self.store.complete_task(task.id).await {
                    tracing::error!(task_id = task.id, error = %e, "failed to complete task");
                }
                return;
            }
            Err(e) => e,
        };

        if error.is_retryable() && task.attempts < MAX_ATTEMPTS {
            let backoff = Duration::seconds(BASE_BACKOFF_SECS << (task.attempts - 1).min(8));
            let next_attempt_at = Utc::now() + backoff;
            tracing::warn!(
                task_id = task.id,
                kind = task.payload.kind(),
                attempt = task.attempts,
                error = %error,
                "task failed, retrying with backoff"
            );
            if let Err(e) = self
                .store
                .reschedule_task(task.id, next_attempt_at, &error.to_string())
                .await
            {
                tracing::error!(task_id = task.id, error = %e, "failed to reschedule task");
            }
        } else {
            metrics::counter!("outbox_tasks_dead_total", "kind" => task.payload.kind())
                .increment(1);
            tracing::error!(
                task_id = task.id,
                kind = task.payload.kind(),
                attempts = task.attempts,
                error = %error,
                "task failed permanently"
            );
            if let Err(e) = self.store.bury_task(task.id, &error.to_string()).await {
                tracing::error!(task_id = task.id, error = %e, "failed to bury task");
            }
        }
    }
}
