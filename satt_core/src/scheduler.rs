//! Deferred task execution for lightpath retries.
//!
//! `ThreadScheduler` owns one worker thread that runs tasks once their delay
//! has passed. The thread is shut down and joined when the scheduler is
//! dropped; tasks still pending at that point are discarded.
//!
//! `ManualScheduler` queues tasks and runs them only when asked, for tests and
//! single-shot CLI commands.
use crossbeam_channel as xch;
use satt_traits::TaskScheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

pub struct ThreadScheduler {
    tx: Option<xch::Sender<(Instant, Task)>>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for ThreadScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadScheduler")
            .field("running", &self.join_handle.is_some())
            .finish()
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::spawn()
    }
}

impl ThreadScheduler {
    pub fn spawn() -> Self {
        let (tx, rx) = xch::unbounded::<(Instant, Task)>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut pending: Vec<(Instant, Task)> = Vec::new();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("scheduler thread received shutdown signal");
                    break;
                }

                let now = Instant::now();
                // Run everything that is due, earliest first.
                pending.sort_by_key(|(due, _)| *due);
                let split = pending.partition_point(|(due, _)| *due <= now);
                for (_, task) in pending.drain(..split) {
                    task();
                }

                let wait = pending
                    .first()
                    .map(|(due, _)| due.saturating_duration_since(now))
                    .unwrap_or(Duration::from_millis(100));
                match rx.recv_timeout(wait) {
                    Ok(job) => pending.push(job),
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("scheduler sender dropped, exiting thread");
                        break;
                    }
                }
            }
            if !pending.is_empty() {
                tracing::debug!(discarded = pending.len(), "scheduler exiting with pending tasks");
            }
        });

        Self {
            tx: Some(tx),
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl TaskScheduler for ThreadScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send + 'static>, delay: Duration) {
        let Some(tx) = &self.tx else { return };
        if tx.send((Instant::now() + delay, task)).is_err() {
            tracing::warn!("scheduler thread is gone; task dropped");
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Dropping the sender wakes the worker out of recv_timeout.
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            // A task that drops the last owner runs on the worker itself.
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            match handle.join() {
                Ok(()) => tracing::trace!("scheduler thread joined"),
                Err(e) => tracing::warn!(?e, "scheduler thread panicked during shutdown"),
            }
        }
    }
}

/// Queues tasks until `run_all` is called. Delays are recorded, not honored.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<(Duration, Task)>>,
}

impl core::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Delays of the queued tasks, in scheduling order.
    pub fn delays(&self) -> Vec<Duration> {
        self.queue
            .lock()
            .map(|q| q.iter().map(|(d, _)| *d).collect())
            .unwrap_or_default()
    }

    /// Run every queued task; returns how many ran.
    ///
    /// Tasks scheduled while running are left for the next call.
    pub fn run_all(&self) -> usize {
        let tasks = match self.queue.lock() {
            Ok(mut q) => std::mem::take(&mut *q),
            Err(_) => return 0,
        };
        let n = tasks.len();
        for (_, task) in tasks {
            task();
        }
        n
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send + 'static>, delay: Duration) {
        if let Ok(mut q) = self.queue.lock() {
            q.push((delay, task));
        }
    }
}
