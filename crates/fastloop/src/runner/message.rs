//! src/runner/message.rs
//!
//! The records exchanged between the coordinator and its workers.

/// One unit of work: a batch index plus the payload read from the input
/// table at that index.
///
/// Jobs are created by the coordinator on demand, one at a time in
/// increasing index order, and handed to exactly one worker. They are
/// never mutated and never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Job<P> {
    pub index: usize,
    pub payload: P,
}

/// The outcome of running the computation on one job, keyed by the same
/// index. Produced exactly once per job; consumed exactly once by the
/// coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult<R> {
    pub index: usize,
    pub outcome: R,
}

/// Messages travelling coordinator → worker.
///
/// The stop signal is a real variant rather than an in-band sentinel
/// value, so a worker's receive step is a total, exhaustive match.
#[derive(Debug)]
pub enum WorkerMessage<P> {
    /// Run this job and send its `JobResult` back.
    Job(Job<P>),
    /// Exit the worker loop.
    Stop,
}
