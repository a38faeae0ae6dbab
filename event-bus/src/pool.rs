//! Bounded worker pool that executes demux tasks.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks on a fixed set of worker threads.
///
/// The task channel has zero capacity, so [`WorkerPool::post`] rendezvouses
/// with a worker: it blocks until one is free and returns once the task has
/// been handed over, which both bounds concurrency at the pool's capacity
/// and guarantees the task has started by the time `post` returns.
pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    quiescence: Arc<Quiescence>,
}

struct Quiescence {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl WorkerPool {
    /// Spawns a pool of `capacity` workers; values below 1 are coerced to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded::<Task>(0);
        let quiescence = Arc::new(Quiescence {
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
        });

        let workers = (0..capacity)
            .map(|n| {
                let rx = rx.clone();
                let quiescence = Arc::clone(&quiescence);
                thread::Builder::new()
                    .name(format!("demux-{n}"))
                    .spawn(move || worker_loop(rx, quiescence))
                    .expect("failed to spawn demux worker")
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
            quiescence,
        }
    }

    /// Admits a task, blocking until a worker is free to take it.
    pub fn post(&self, task: Task) {
        let Some(tx) = self.tx.as_ref() else { return };
        *self.quiescence.in_flight.lock() += 1;
        if tx.send(task).is_err() {
            self.quiescence.finish_one();
        }
    }

    /// Blocks until every task posted so far has completed. Not a one-shot
    /// close: the pool keeps accepting tasks afterwards.
    pub fn wait(&self) {
        let mut in_flight = self.quiescence.in_flight.lock();
        while *in_flight > 0 {
            self.quiescence.idle.wait(&mut in_flight);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // disconnect the channel so idle workers wind down
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Quiescence {
    fn finish_one(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight -= 1;
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

fn worker_loop(rx: Receiver<Task>, quiescence: Arc<Quiescence>) {
    while let Ok(task) = rx.recv() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
            tracing::error!(payload = panic_text(panic.as_ref()), "task panicked");
        }
        quiescence.finish_one();
    }
}

/// Best-effort text of a panic payload, for logging and error events.
pub(crate) fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "non-string panic payload"
    }
}
