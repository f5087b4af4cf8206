//! src/runner/mod.rs
//!
//! The worker-pool job runner.
//!
//! A `JobPool` turns a flat batch of `total_jobs` indexed jobs into
//! `total_jobs` stored results using at most `pool_size` concurrent
//! workers, with bounded memory (at most one job in flight per worker)
//! and progress visibility.
//!
//! # Architecture Overview
//!
//! ```text
//!   source(index) ──▶ ┌────────────┐ ◀── PoolConfig (pool size, cadence)
//!   (input table)     │  JobPool   │
//!                     │ coordinator│──▶ sink(index, outcome)
//!                     └─────┬──────┘    (output table)
//!                           │ one duplex channel per slot
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!     [worker 0]       [worker 1]  ...  [worker W-1]
//!      computation      computation      computation
//! ```
//!
//! Jobs are produced lazily in increasing index order and always
//! redispatched down the channel that just delivered a result, so no
//! worker ever holds more than one job. Results may complete in any
//! order; the output store is indexed, so order does not matter.
//!
//! # Module Structure
//!
//! ```text
//! src/runner/
//! ├── mod.rs        # Public API exports + architecture docs
//! ├── config.rs     # PoolConfig, builder, pool-size resolution
//! ├── message.rs    # Job, JobResult, WorkerMessage
//! ├── channel.rs    # Duplex: bidirectional message channel
//! ├── worker.rs     # Worker loop and WorkerHandle lifecycle
//! └── scheduler.rs  # JobPool: dispatch/collect loop and accounting
//! ```

// Module declarations
pub mod channel;
mod config;
mod message;
mod scheduler;
mod worker;

// Public re-exports
pub use channel::{duplex, Duplex};
pub use config::{PoolConfig, PoolConfigBuilder, PoolSize};
pub use message::{Job, JobResult, WorkerMessage};
pub use scheduler::{JobPool, RunSummary};

/// Per-direction capacity of each worker's duplex channel. One slot is
/// enough: a worker never has more than one job outstanding and never
/// more than one uncollected result, so anything larger would only hide
/// backpressure.
pub(crate) const CHANNEL_CAPACITY: usize = 1;
