//! Shared periodic scheduler for poll-driven bridges
//!
//! A single [`Scheduler`] is injected into every bridge. [`TokioScheduler`]
//! runs each scheduled task on its own interval on a tokio runtime;
//! [`ManualScheduler`] only runs tasks when a test calls
//! [`ManualScheduler::tick`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Work performed on every tick
#[async_trait]
pub trait PollTask: Send + Sync {
    /// Run one tick. Returning `false` removes the task from the schedule.
    async fn run(&self) -> bool;
}

/// Periodic scheduler shared by all poll bridges
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, first tick one period from now
    fn schedule(&self, name: &str, period: Duration, task: Arc<dyn PollTask>) -> ScheduleHandle;
}

/// Removes a scheduled task
pub trait TaskCanceller: Send + Sync {
    fn cancel(&self, id: u64);
}

/// Handle on one scheduled task. Cancelling is idempotent.
pub struct ScheduleHandle {
    id: u64,
    canceller: Weak<dyn TaskCanceller>,
    cancelled: AtomicBool,
}

impl ScheduleHandle {
    pub fn new(id: u64, canceller: Weak<dyn TaskCanceller>) -> Self {
        Self {
            id,
            canceller,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(canceller) = self.canceller.upgrade() {
            canceller.cancel(self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Scheduler backed by a tokio runtime
#[derive(Clone)]
pub struct TokioScheduler {
    inner: Arc<TokioTasks>,
}

struct TokioTasks {
    runtime: Handle,
    tasks: DashMap<u64, AbortHandle>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Scheduler on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(TokioTasks {
                runtime,
                tasks: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of tasks currently scheduled
    pub fn active(&self) -> usize {
        self.inner.tasks.len()
    }
}

impl TaskCanceller for TokioTasks {
    fn cancel(&self, id: u64) {
        if let Some((_, task)) = self.tasks.remove(&id) {
            task.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, name: &str, period: Duration, task: Arc<dyn PollTask>) -> ScheduleHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::downgrade(&self.inner);
        let name = name.to_string();

        let join = self.inner.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !task.run().await {
                    break;
                }
            }
            debug!("Scheduler: task '{}' finished", name);
            if let Some(tasks) = tasks.upgrade() {
                tasks.tasks.remove(&id);
            }
        });

        self.inner.tasks.insert(id, join.abort_handle());
        if join.is_finished() {
            self.inner.tasks.remove(&id);
        }

        let canceller: Arc<dyn TaskCanceller> = self.inner.clone();
        ScheduleHandle::new(id, Arc::downgrade(&canceller))
    }
}

/// Deterministic scheduler: tasks run only when [`tick`](Self::tick) is called
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<ManualTasks>,
}

#[derive(Default)]
struct ManualTasks {
    tasks: Mutex<Vec<ManualTask>>,
    next_id: AtomicU64,
}

struct ManualTask {
    id: u64,
    period: Duration,
    task: Arc<dyn PollTask>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every scheduled task once, in scheduling order. Returns how many ran.
    pub async fn tick(&self) -> usize {
        let due: Vec<(u64, Arc<dyn PollTask>)> = self
            .inner
            .tasks
            .lock()
            .iter()
            .map(|t| (t.id, t.task.clone()))
            .collect();

        for (id, task) in &due {
            if !task.run().await {
                self.inner.cancel(*id);
            }
        }
        due.len()
    }

    pub fn scheduled(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Periods of the scheduled tasks, in scheduling order
    pub fn periods(&self) -> Vec<Duration> {
        self.inner.tasks.lock().iter().map(|t| t.period).collect()
    }
}

impl TaskCanceller for ManualTasks {
    fn cancel(&self, id: u64) {
        self.tasks.lock().retain(|t| t.id != id);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, _name: &str, period: Duration, task: Arc<dyn PollTask>) -> ScheduleHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.tasks.lock().push(ManualTask { id, period, task });

        let canceller: Arc<dyn TaskCanceller> = self.inner.clone();
        ScheduleHandle::new(id, Arc::downgrade(&canceller))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counter {
        runs: AtomicUsize,
        limit: usize,
    }

    #[async_trait]
    impl PollTask for Counter {
        async fn run(&self) -> bool {
            self.runs.fetch_add(1, Ordering::SeqCst) + 1 < self.limit
        }
    }

    fn counter(limit: usize) -> Arc<Counter> {
        Arc::new(Counter {
            runs: AtomicUsize::new(0),
            limit,
        })
    }

    #[tokio::test]
    async fn test_manual_tick_and_cancel() {
        let scheduler = ManualScheduler::new();
        let task = counter(usize::MAX);
        let handle = scheduler.schedule("t", Duration::from_secs(1), task.clone());

        assert_eq!(scheduler.tick().await, 1);
        assert_eq!(scheduler.tick().await, 1);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(scheduler.tick().await, 0);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_manual_task_removes_itself() {
        let scheduler = ManualScheduler::new();
        let task = counter(2);
        scheduler.schedule("t", Duration::from_millis(500), task.clone());
        assert_eq!(scheduler.periods(), vec![Duration::from_millis(500)]);

        scheduler.tick().await;
        scheduler.tick().await;
        assert_eq!(scheduler.scheduled(), 0);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_period_and_cancel() {
        let scheduler = TokioScheduler::new();
        let task = counter(usize::MAX);
        let handle = scheduler.schedule("t", Duration::from_secs(1), task.clone());
        assert_eq!(scheduler.active(), 1);

        // First tick is one period after scheduling
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);

        handle.cancel();
        assert_eq!(scheduler.active(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(task.runs.load(Ordering::SeqCst), 3);
    }
}
