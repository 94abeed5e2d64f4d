//! Background task scheduling.
//!
//! Every background job runs as a tokio task owned by a [`TaskHandle`].
//! Dropping the handle aborts the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use civic_common::AppResult;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

/// Owner of a spawned background task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Task name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Abort the task. Calling this more than once is harmless.
    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Whether the task completed or was aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the task to end. An aborted task counts as ended.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(task = self.name, "Background task panicked");
                }
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A job run on a fixed period.
#[async_trait::async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    /// Task name used in logs.
    fn name(&self) -> &'static str;

    /// Run once. Returns the number of items processed.
    async fn tick(&self) -> AppResult<usize>;
}

/// Run `task` first after `initial_delay`, then every `period`.
///
/// Ticks never overlap: each one is awaited before the next is scheduled, and
/// ticks missed while one was running are skipped.
pub fn spawn_periodic<T: PeriodicTask>(
    task: Arc<T>,
    initial_delay: Duration,
    period: Duration,
) -> TaskHandle {
    let name = task.name();
    let period = period.max(Duration::from_millis(1));

    let handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + initial_delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match task.tick().await {
                Ok(0) => debug!(task = name, "Periodic task found nothing to do"),
                Ok(count) => info!(task = name, count, "Periodic task completed"),
                Err(e) => error!(task = name, error = %e, "Periodic task failed"),
            }
        }
    });

    info!(task = name, ?initial_delay, ?period, "Periodic task scheduled");
    TaskHandle::new(name, handle)
}

/// Run `future` once after `delay`.
pub fn spawn_delayed<F>(name: &'static str, delay: Duration, future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        future.await;
    });
    TaskHandle::new(name, handle)
}
