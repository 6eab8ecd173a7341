//! Bounded background worker pool for classify-and-structure jobs.
//!
//! Jobs are document ids. Each worker pulls from one shared bounded channel;
//! per-document ordering is enforced by the document locks inside the job,
//! not by the queue. Dropping the handle stops intake, drains queued jobs
//! and joins every worker.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Structuring queue is full")]
    Full,

    #[error("Structuring queue is shut down")]
    Closed,
}

type Job = Arc<dyn Fn(Uuid) + Send + Sync>;

pub struct StructuringQueue {
    sender: Mutex<Option<SyncSender<Uuid>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Arc<InFlight>,
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn add(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
    }

    fn done(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }
}

/// Marks a job finished even if the handler panics.
struct JobDone<'a>(&'a InFlight);

impl Drop for JobDone<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

impl StructuringQueue {
    /// Spawn `workers` threads (at least one) sharing a queue of `capacity` jobs.
    pub fn start<F>(workers: usize, capacity: usize, handler: F) -> Self
    where
        F: Fn(Uuid) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Uuid>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let handler: Job = Arc::new(handler);
        let in_flight = Arc::new(InFlight::default());

        let handles = (0..workers.max(1))
            .map(|n| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let in_flight = Arc::clone(&in_flight);
                std::thread::Builder::new()
                    .name(format!("structuring-{n}"))
                    .spawn(move || worker_loop(n, &rx, &handler, &in_flight))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to spawn structuring worker");
                    None
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(workers = handles.len(), capacity, "Structuring queue started");

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            in_flight,
        }
    }

    /// Queue a document without blocking.
    pub fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        let sender = self.sender.lock().map_err(|_| QueueError::Closed)?;
        let tx = sender.as_ref().ok_or(QueueError::Closed)?;

        self.in_flight.add();
        match tx.try_send(id) {
            Ok(()) => {
                tracing::debug!(doc_id = %id, "Structuring job queued");
                Ok(())
            }
            Err(e) => {
                self.in_flight.done();
                Err(match e {
                    TrySendError::Full(_) => QueueError::Full,
                    TrySendError::Disconnected(_) => QueueError::Closed,
                })
            }
        }
    }

    /// Block until every queued and running job has finished, or `timeout`
    /// elapses. Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let Ok(count) = self.in_flight.count.lock() else {
            return false;
        };
        match self
            .in_flight
            .idle
            .wait_timeout_while(count, timeout, |c| *c > 0)
        {
            Ok((_, result)) => !result.timed_out(),
            Err(_) => false,
        }
    }

    /// Stop accepting jobs, let workers drain the queue, and join them.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handles = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Structuring worker panicked");
            }
        }
    }
}

impl Drop for StructuringQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(n: usize, rx: &Mutex<Receiver<Uuid>>, handler: &Job, in_flight: &InFlight) {
    loop {
        let next = match rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let Ok(id) = next else {
            break;
        };
        let _done = JobDone(in_flight);
        handler(id);
    }
    tracing::debug!(worker = n, "Structuring worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_queued_job() {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let queue = {
            let seen = Arc::clone(&seen);
            StructuringQueue::start(3, 16, move |id| {
                seen.lock().unwrap().insert(id);
            })
        };

        let ids: Vec<Uuid> = (0..10).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.enqueue(*id).unwrap();
        }
        assert!(queue.wait_idle(Duration::from_secs(5)));
        assert_eq!(seen.lock().unwrap().len(), 10);
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let queue = {
            let gate = Arc::clone(&gate);
            StructuringQueue::start(1, 1, move |_| {
                let (open, cv) = &*gate;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = cv.wait(open).unwrap();
                }
            })
        };

        // One job parks in the worker, one fills the channel.
        queue.enqueue(Uuid::new_v4()).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        queue.enqueue(Uuid::new_v4()).unwrap();
        assert_eq!(queue.enqueue(Uuid::new_v4()), Err(QueueError::Full));

        *gate.0.lock().unwrap() = true;
        gate.1.notify_all();
        assert!(queue.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn shutdown_drains_then_rejects() {
        let count = Arc::new(AtomicUsize::new(0));
        let queue = {
            let count = Arc::clone(&count);
            StructuringQueue::start(2, 8, move |_| {
                std::thread::sleep(Duration::from_millis(10));
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        for _ in 0..5 {
            queue.enqueue(Uuid::new_v4()).unwrap();
        }
        queue.shutdown();

        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(queue.enqueue(Uuid::new_v4()), Err(QueueError::Closed));
    }

    #[test]
    fn idle_queue_reports_idle_immediately() {
        let queue = StructuringQueue::start(1, 1, |_| {});
        assert!(queue.wait_idle(Duration::from_millis(10)));
    }
}
