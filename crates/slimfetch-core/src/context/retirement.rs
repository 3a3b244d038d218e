//! Background closing of retired execution contexts.
//!
//! Retired contexts are queued with a deadline of `now + grace_delay`. A
//! dedicated thread sleeps until the earliest deadline and closes every due
//! context. Under [`DrainPolicy::AwaitInFlight`] a due context that still has
//! leases out is re-checked every `drain_poll_interval` instead.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use super::execution::ExecutionContext;
use super::manager::ContextStats;
use crate::config::{ContextConfig, DrainPolicy};

struct Retiring {
    context: Arc<ExecutionContext>,
    deadline: Instant,
}

#[derive(Default)]
struct Queue {
    pending: Vec<Retiring>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    signal: Condvar,
    stats: Arc<ContextStats>,
    config: ContextConfig,
}

/// Worker thread that closes retired contexts after the grace delay.
pub struct RetirementWorker {
    shared: Arc<Shared>,
    /// Worker thread handle.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetirementWorker {
    /// Start the worker thread.
    pub fn start(config: ContextConfig, stats: Arc<ContextStats>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            signal: Condvar::new(),
            stats,
            config,
        });
        let worker_shared = shared.clone();

        let handle = thread::Builder::new()
            .name("slimfetch-retirement".into())
            .spawn(move || Self::worker_loop(&worker_shared))
            .ok();
        if handle.is_none() {
            error!("failed to spawn context retirement thread; retired contexts close on shutdown");
        }

        Self {
            shared,
            handle: Mutex::new(handle),
        }
    }

    /// Queue a context for closing after the grace delay.
    pub fn retire(&self, context: Arc<ExecutionContext>) {
        let deadline = Instant::now() + self.shared.config.grace_delay;
        debug!(generation = context.generation(), "execution context retiring");

        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            drop(queue);
            close(&self.shared, &context);
            return;
        }
        queue.pending.push(Retiring { context, deadline });
        self.shared.signal.notify_one();
    }

    /// Number of contexts waiting to be closed.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Number of contexts closed so far.
    pub fn closed(&self) -> u64 {
        self.shared.stats.closed()
    }

    /// Stop the worker, closing every pending context, and wait for it to finish.
    pub fn stop(&self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            self.shared.signal.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        let remaining = std::mem::take(&mut self.shared.queue.lock().pending);
        for retiring in remaining {
            close(&self.shared, &retiring.context);
        }
    }

    /// Check if the worker is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// The main worker loop.
    fn worker_loop(shared: &Shared) {
        let poll_interval = shared.config.drain_poll_interval;
        let mut queue = shared.queue.lock();

        loop {
            if queue.shutdown {
                break;
            }

            let now = Instant::now();
            queue.pending.retain_mut(|retiring| {
                if retiring.deadline > now {
                    return true;
                }
                let draining = shared.config.drain_policy == DrainPolicy::AwaitInFlight
                    && retiring.context.in_flight() > 0;
                if draining {
                    retiring.deadline = now + poll_interval;
                    return true;
                }
                close(shared, &retiring.context);
                false
            });

            match queue.pending.iter().map(|r| r.deadline).min() {
                Some(next) => {
                    shared.signal.wait_until(&mut queue, next);
                }
                None => shared.signal.wait(&mut queue),
            }
        }
    }
}

fn close(shared: &Shared, context: &ExecutionContext) {
    shared.stats.record_closed();
    context.close();

    let retired_for = context
        .retired_at()
        .zip(context.closed_at())
        .map(|(retired, closed)| closed.duration_since(retired).as_millis() as u64)
        .unwrap_or(0);
    info!(
        generation = context.generation(),
        retired_for_ms = retired_for,
        in_flight = context.in_flight(),
        "execution context closed"
    );
}

impl Drop for RetirementWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
