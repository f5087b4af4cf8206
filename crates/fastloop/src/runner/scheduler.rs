//! src/runner/scheduler.rs
//!
//! The pool coordinator: owns the worker handles, feeds them jobs,
//! collects results, accounts for completion, and tears the pool down.
//!
//! # Dispatch/collect cycle
//!
//! After priming every slot with one job, the coordinator blocks on a
//! readiness sweep across all worker channels. When a slot delivers a
//! result, the next job index (if any remain) goes straight back down
//! that same channel before the result is stored, so the worker is
//! computing again while the coordinator writes. The loop ends exactly
//! when `jobs_done == total_jobs`; only then is the stop signal sent
//! and every thread joined.
//!
//! # Accounting invariants
//!
//! - `jobs_done <= jobs_started <= total_jobs` at all times.
//! - Every index in `[0, total_jobs)` is dispatched exactly once, in
//!   strictly increasing order.
//! - At most one job is in flight per worker, so at most `pool_size`
//!   in flight overall.
//!
//! A worker channel that disconnects mid-run means a worker died with a
//! job unaccounted for; the run aborts with an error naming the slot
//! and the lost index rather than waiting forever or dropping the job.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Select, TryRecvError};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::config::PoolConfig;
use super::message::{Job, JobResult, WorkerMessage};
use super::worker::WorkerHandle;
use crate::compute::Computation;
use crate::progress::ProgressSink;

/// Completion accounting for one run. Owned and mutated exclusively by
/// the coordinator loop; workers never see it.
#[derive(Debug, Clone, Copy)]
struct PoolState {
    jobs_started: usize,
    jobs_done: usize,
    total_jobs: usize,
}

impl PoolState {
    fn new(total_jobs: usize) -> Self {
        Self {
            jobs_started: 0,
            jobs_done: 0,
            total_jobs,
        }
    }

    fn all_done(&self) -> bool {
        self.jobs_done == self.total_jobs
    }

    fn check(&self) {
        debug_assert!(self.jobs_done <= self.jobs_started);
        debug_assert!(self.jobs_started <= self.total_jobs);
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_jobs: usize,
    /// Workers actually used, after clamping to the host.
    pub pool_size: usize,
    /// Wall-clock duration of the run, priming and teardown included.
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn jobs_per_sec(&self) -> f64 {
        self.total_jobs as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

/// A pool of workers that turns `total_jobs` indexed jobs into
/// `total_jobs` stored results.
///
/// # Type parameters
/// - `P`: Job payload, read from the input table and moved to a worker
/// - `R`: Computation outcome, moved back and written to the output
///   table
pub struct JobPool<P, R> {
    workers: Vec<WorkerHandle<P, R>>,
    state: PoolState,
    progress_every: usize,
}

impl<P, R> JobPool<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Validates the configuration and spawns the workers. No job is
    /// dispatched until [`run`](Self::run).
    ///
    /// # Errors
    /// - `total_jobs` is 0
    /// - the pool size resolves to 0 workers
    /// - a worker thread cannot be spawned
    pub fn spawn<C>(config: &PoolConfig, total_jobs: usize, computation: C) -> Result<Self>
    where
        C: Computation<P, R> + 'static,
    {
        if total_jobs == 0 {
            return Err(anyhow!("Cannot run a batch of 0 jobs"));
        }
        let pool_size = config.resolve_pool_size()?;

        let computation = Arc::new(computation);
        let mut workers = Vec::with_capacity(pool_size);
        for slot in 0..pool_size {
            workers.push(
                WorkerHandle::spawn(slot, Arc::clone(&computation))
                    .with_context(|| format!("Failed to start a pool of {} workers", pool_size))?,
            );
        }
        debug!(pool_size, total_jobs, "worker pool started");

        Ok(Self {
            workers,
            state: PoolState::new(total_jobs),
            progress_every: config.progress_every(total_jobs),
        })
    }

    /// Number of workers actually spawned, after clamping.
    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Runs the batch to completion, consuming the pool.
    ///
    /// `source` reads the payload for a job index out of the input
    /// table; it is called once per index, in strictly increasing
    /// order. `sink` writes one finished result into the output table;
    /// it is called exactly once per index, in completion order.
    /// `progress` is invoked on a bounded cadence and once more at
    /// 100%.
    ///
    /// Either every index in `[0, total_jobs)` is dispatched and stored
    /// exactly once, or the run aborts on the first fatal error (a dead
    /// worker, or a failing source/sink). Workers are stopped and
    /// joined on both paths.
    pub fn run<S, K, G>(mut self, mut source: S, mut sink: K, mut progress: G) -> Result<RunSummary>
    where
        S: FnMut(usize) -> Result<P>,
        K: FnMut(usize, R) -> Result<()>,
        G: ProgressSink,
    {
        let started = Instant::now();
        let pool_size = self.workers.len();

        // Prime every slot with one job, in slot order. A pool larger
        // than the batch leaves its tail slots idle until shutdown.
        for slot in 0..pool_size {
            if self.state.jobs_started == self.state.total_jobs {
                break;
            }
            self.dispatch(slot, &mut source)?;
        }

        while !self.state.all_done() {
            let slot = self.next_ready_slot();
            let result = match self.workers[slot].channel.try_recv() {
                Ok(result) => result,
                // Readiness sweeps may report a slot spuriously; wait
                // again.
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => return Err(self.worker_died(slot)),
            };
            self.collect(slot, result, &mut source, &mut sink)?;

            if self.state.jobs_done % self.progress_every == 0 && !self.state.all_done() {
                self.report(&mut progress, started);
            }
        }

        self.report(&mut progress, started);
        self.teardown()?;

        Ok(RunSummary {
            total_jobs: self.state.total_jobs,
            pool_size,
            elapsed: started.elapsed(),
        })
    }

    /// Produce the next job index and send it down `slot`'s channel.
    fn dispatch<S>(&mut self, slot: usize, source: &mut S) -> Result<()>
    where
        S: FnMut(usize) -> Result<P>,
    {
        let index = self.state.jobs_started;
        let payload =
            source(index).with_context(|| format!("Failed to read payload for job {}", index))?;
        self.workers[slot]
            .channel
            .send(WorkerMessage::Job(Job { index, payload }))
            .with_context(|| format!("Failed to send job {} to worker {}", index, slot))?;
        self.workers[slot].in_flight = Some(index);
        self.state.jobs_started += 1;
        self.state.check();
        Ok(())
    }

    /// Redispatch on the delivering slot, then store the result.
    fn collect<S, K>(
        &mut self,
        slot: usize,
        result: JobResult<R>,
        source: &mut S,
        sink: &mut K,
    ) -> Result<()>
    where
        S: FnMut(usize) -> Result<P>,
        K: FnMut(usize, R) -> Result<()>,
    {
        self.workers[slot].in_flight = None;
        if self.state.jobs_started < self.state.total_jobs {
            self.dispatch(slot, source)?;
        }
        sink(result.index, result.outcome)
            .with_context(|| format!("Failed to store result for job {}", result.index))?;
        self.state.jobs_done += 1;
        self.state.check();
        Ok(())
    }

    /// Blocks until some worker's result channel is readable. A channel
    /// whose worker died also reads as ready and surfaces through
    /// `try_recv` as a disconnect.
    fn next_ready_slot(&self) -> usize {
        let mut select = Select::new();
        for worker in &self.workers {
            select.recv(worker.channel.receiver());
        }
        select.ready()
    }

    fn report<G: ProgressSink>(&self, progress: &mut G, started: Instant) {
        let fraction = self.state.jobs_done as f64 / self.state.total_jobs as f64;
        let rate = self.state.jobs_done as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
        let message = format!(
            "{:.2} jobs/s; job {}/{}",
            rate, self.state.jobs_done, self.state.total_jobs
        );
        progress.report(fraction, &message, started);
    }

    fn worker_died(&self, slot: usize) -> anyhow::Error {
        warn!(slot, lost = ?self.workers[slot].in_flight, "worker channel disconnected mid-run");
        match self.workers[slot].in_flight {
            Some(index) => anyhow!(
                "Worker {} died before returning a result for job {}",
                slot,
                index
            ),
            None => anyhow!("Worker {} died unexpectedly", slot),
        }
    }

    /// Stop every worker and join its thread. Stop is only ever sent
    /// here, after all jobs are accounted for (the error path relies on
    /// each handle's drop instead).
    fn teardown(&mut self) -> Result<()> {
        debug!("stopping worker pool");
        let mut first_error = None;
        for worker in &mut self.workers {
            if let Err(error) = worker.shutdown() {
                warn!(slot = worker.slot, "worker failed to shut down cleanly");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
