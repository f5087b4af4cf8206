//! src/runner/config.rs
//!
//! Configuration for a `JobPool`.
//!
//! Example:
//! ```ignore
//! let config = PoolConfig::builder()
//!     .pool_size(PoolSize::Fixed(8))
//!     .progress_interval(50)
//!     .build();
//! ```

use anyhow::{anyhow, Result};

/// Requested number of workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolSize {
    /// Use every execution unit the host offers.
    #[default]
    Available,
    /// Use exactly this many workers, clamped to the host's count.
    Fixed(usize),
}

/// Configuration for a `JobPool`.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Requested worker count; resolved against the host at spawn time.
    pub pool_size: PoolSize,
    /// Completions between progress reports. Defaults to roughly 1% of
    /// the batch, never fewer than one completion.
    pub progress_interval: Option<usize>,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Resolves the requested size against the host's execution units.
    ///
    /// Asking for more parallelism than the host can provide is not an
    /// error, just clamped. Asking for zero workers is.
    pub fn resolve_pool_size(&self) -> Result<usize> {
        let available = num_cpus::get();
        match self.pool_size {
            PoolSize::Available => Ok(available),
            PoolSize::Fixed(0) => Err(anyhow!(
                "Cannot run with 0 workers. \
                Use PoolSize::Fixed(n) with n > 0 or PoolSize::Available."
            )),
            PoolSize::Fixed(requested) => Ok(requested.min(available)),
        }
    }

    /// Progress cadence for a batch of `total_jobs` completions.
    ///
    /// Integer division of small batches must not silence reporting
    /// entirely, so the interval is kept within `[1, total_jobs]`.
    pub(crate) fn progress_every(&self, total_jobs: usize) -> usize {
        self.progress_interval
            .unwrap_or(total_jobs / 100)
            .clamp(1, total_jobs.max(1))
    }
}

/// Builder for PoolConfig with method chaining.
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the requested worker count.
    pub fn pool_size(mut self, size: PoolSize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the number of completions between progress reports.
    ///
    /// - Too low: Output floods on large batches.
    /// - Too high: Long-running batches look stalled.
    pub fn progress_interval(mut self, every: usize) -> Self {
        self.config.progress_interval = Some(every);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}
