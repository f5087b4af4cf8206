//! src/runner/worker.rs
//!
//! Worker threads and their lifecycle.
//!
//! Each worker owns nothing but its end of one duplex channel and a
//! shared handle on the computation; payloads and results cross the
//! channel by move. A worker blocks for a message, runs the computation
//! on jobs, answers on the same channel, and exits on `Stop` or when
//! the coordinator goes away.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::thread;
use tracing::debug;

use super::channel::{duplex, Duplex};
use super::message::{JobResult, WorkerMessage};
use super::CHANNEL_CAPACITY;
use crate::compute::Computation;

/// Coordinator-side handle for one pool slot.
///
/// Owns the worker thread and the coordinator end of its channel for
/// the pool's lifetime. `in_flight` is the index dispatched on this
/// slot and not yet collected, if any; it doubles as the slot's state:
/// `None` is idle (or draining once the batch is exhausted), `Some` is
/// awaiting a result.
pub(crate) struct WorkerHandle<P, R> {
    pub(crate) slot: usize,
    pub(crate) channel: Duplex<WorkerMessage<P>, JobResult<R>>,
    pub(crate) in_flight: Option<usize>,
    thread: Option<thread::JoinHandle<()>>,
}

impl<P, R> WorkerHandle<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Spawns the worker thread for `slot`, bound to `computation`.
    pub(crate) fn spawn<C>(slot: usize, computation: Arc<C>) -> Result<Self>
    where
        C: Computation<P, R> + 'static,
    {
        let (host_end, worker_end) = duplex(CHANNEL_CAPACITY);
        let thread = thread::Builder::new()
            .name(format!("fastloop-worker-{}", slot))
            .spawn(move || worker_loop(worker_end, computation))
            .with_context(|| format!("Failed to spawn worker thread {}", slot))?;

        Ok(Self {
            slot,
            channel: host_end,
            in_flight: None,
            thread: Some(thread),
        })
    }
}

impl<P, R> WorkerHandle<P, R> {
    /// Sends the stop signal and waits for the thread to exit.
    ///
    /// The send is best-effort: a worker that already died cannot take
    /// the message, and the join reports that as the real error.
    pub(crate) fn shutdown(&mut self) -> Result<()> {
        let _ = self.channel.send(WorkerMessage::Stop);
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| anyhow!("Worker {} panicked", self.slot))?;
            debug!(slot = self.slot, "worker joined");
        }
        Ok(())
    }
}

impl<P, R> Drop for WorkerHandle<P, R> {
    fn drop(&mut self) {
        // Backstop for early exits; the normal path has already joined.
        if self.thread.is_some() {
            let _ = self.channel.send(WorkerMessage::Stop);
            let _ = self.thread.take().map(thread::JoinHandle::join);
        }
    }
}

/// The loop run inside every worker thread.
fn worker_loop<P, R, C>(channel: Duplex<JobResult<R>, WorkerMessage<P>>, computation: Arc<C>)
where
    C: Computation<P, R>,
{
    loop {
        match channel.recv() {
            Ok(WorkerMessage::Job(job)) => {
                let outcome = computation.run(job.index, job.payload);
                if channel
                    .send(JobResult {
                        index: job.index,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(WorkerMessage::Stop) | Err(_) => break,
        }
    }
}
