//! Fixed-size worker pools draining a shared FIFO queue.
//!
//! Workers never wait for new work: an empty queue ends the worker. A task
//! that fails or panics is logged and dropped; the worker moves on to the
//! next task.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use rayon::ThreadPool;
use tracing::{debug, error, warn};

pub trait Task: Send + 'static {
    type Error: fmt::Display;

    fn perform(self) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub struct TaskQueue<T> {
    tasks: Mutex<VecDeque<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: T) {
        self.lock().push_back(task);
    }

    pub fn extend(&self, tasks: impl IntoIterator<Item = T>) {
        self.lock().extend(tasks);
    }

    /// Removes the oldest task, or returns `None` right away when empty.
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome counts of one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl PoolSummary {
    fn add(&mut self, other: PoolSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.panicked += other.panicked;
    }
}

/// Runs `size` worker loops on a dedicated rayon pool. Each loop drains the
/// shared queue and reports its [`PoolSummary`] back when the queue is empty.
pub struct WorkerPool<T: Task> {
    name: String,
    size: usize,
    queue: Arc<TaskQueue<T>>,
    pool: Option<ThreadPool>,
    done: Option<Receiver<PoolSummary>>,
}

impl<T: Task> WorkerPool<T> {
    pub fn new(name: impl Into<String>, size: usize, queue: Arc<TaskQueue<T>>) -> Self {
        Self {
            name: name.into(),
            size: size.max(1),
            queue,
            pool: None,
            done: None,
        }
    }

    /// Spawns the workers. Calling it again on a running pool does nothing.
    /// No worker is started when the pool cannot be built.
    pub fn start(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }

        let thread_prefix = self.name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.size)
            .thread_name(move |i| format!("{thread_prefix}-{}", i + 1))
            .build()
            .with_context(|| format!("Failed to build worker pool {}", self.name))?;

        let (tx, rx) = mpsc::channel();
        for i in 0..self.size {
            let worker_name = format!("{}-{}", self.name, i + 1);
            let queue = Arc::clone(&self.queue);
            let tx = tx.clone();
            pool.spawn(move || {
                let _ = tx.send(run_worker(&worker_name, &queue));
            });
        }

        self.pool = Some(pool);
        self.done = Some(rx);
        Ok(())
    }

    /// Blocks until every worker has exited, which means the queue is drained.
    pub fn join(self) -> PoolSummary {
        let mut summary = PoolSummary::default();
        let mut finished = 0;
        if let Some(done) = self.done {
            // Ends once every worker has sent its summary and dropped its sender.
            for worker in done.iter() {
                summary.add(worker);
                finished += 1;
            }
        }
        if self.pool.is_some() && finished < self.size {
            // run_worker contains task panics, so this is a bug in the loop itself.
            error!(pool = %self.name, finished, size = self.size, "worker died");
        }
        debug!(
            pool = %self.name,
            completed = summary.completed,
            failed = summary.failed,
            panicked = summary.panicked,
            "pool drained"
        );
        summary
    }

    /// `start` followed by `join`.
    pub fn run(mut self) -> Result<PoolSummary> {
        self.start()?;
        Ok(self.join())
    }
}

fn run_worker<T: Task>(worker: &str, queue: &TaskQueue<T>) -> PoolSummary {
    let mut summary = PoolSummary::default();
    while let Some(task) = queue.pop() {
        match panic::catch_unwind(AssertUnwindSafe(|| task.perform())) {
            Ok(Ok(())) => summary.completed += 1,
            Ok(Err(err)) => {
                summary.failed += 1;
                warn!(worker, error = %err, "task failed");
            }
            Err(payload) => {
                summary.panicked += 1;
                error!(worker, panic = panic_message(payload.as_ref()), "task panicked");
            }
        }
    }
    summary
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
