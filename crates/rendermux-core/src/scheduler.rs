//! Timer scheduling for throttled stream flushes
//!
//! The buffer manager never touches a global timer. It asks an injected
//! [`Scheduler`] for the current time and for deferred callbacks, so tests can
//! drive streams with [`ManualScheduler`] instead of waiting on a wall clock.

use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A deferred unit of work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of time and deferred callbacks
pub trait Scheduler: Send + Sync {
    /// Current time as seen by this scheduler
    fn now(&self) -> Instant;

    /// Run `task` once after `delay`, unless the returned handle is cancelled first
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancellation handle for a scheduled task
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    /// Create a live handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevent the task from running. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler backed by the tokio timer wheel
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling context
    pub fn new() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::internal(format!("No tokio runtime available: {}", e)))?;
        Ok(Self { handle })
    }

    /// Bind to an explicit runtime handle
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        // tokio's clock honours `time::pause()` in tests
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let timer = TimerHandle::new();
        let guard = timer.clone();

        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !guard.is_cancelled() {
                task();
            }
        });

        timer
    }
}

struct PendingTask {
    deadline: Instant,
    order: u64,
    timer: TimerHandle,
    task: Task,
}

struct ManualClock {
    now: Instant,
    pending: Vec<PendingTask>,
    next_order: u64,
}

/// Virtual clock that only moves when told to
///
/// Tasks run synchronously inside [`ManualScheduler::advance`], in deadline
/// order, with the clock set to each task's deadline while it runs.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(Mutex::new(ManualClock {
                now: Instant::now(),
                pending: Vec::new(),
                next_order: 0,
            })),
        }
    }

    /// Move the clock forward, running every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().now + by;

        loop {
            let due = {
                let mut clock = self.clock.lock();
                let next = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.deadline <= target)
                    .min_by_key(|(_, p)| (p.deadline, p.order))
                    .map(|(idx, _)| idx);

                match next {
                    Some(idx) => {
                        let pending = clock.pending.swap_remove(idx);
                        if pending.deadline > clock.now {
                            clock.now = pending.deadline;
                        }
                        Some(pending)
                    }
                    None => None,
                }
            };

            // Lock is released here so tasks may schedule follow-ups
            match due {
                Some(pending) if !pending.timer.is_cancelled() => (pending.task)(),
                Some(_) => continue,
                None => break,
            }
        }

        self.clock.lock().now = target;
    }

    /// Number of scheduled tasks that have not run or been cancelled
    pub fn pending(&self) -> usize {
        self.clock
            .lock()
            .pending
            .iter()
            .filter(|p| !p.timer.is_cancelled())
            .count()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.clock.lock().now
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let timer = TimerHandle::new();
        let mut clock = self.clock.lock();
        let order = clock.next_order;
        clock.next_order += 1;
        let deadline = clock.now + delay;
        clock.pending.push(PendingTask {
            deadline,
            order,
            timer: timer.clone(),
            task,
        });
        timer
    }
}
