pub mod compute;
pub mod fit;
pub mod progress;
pub mod record;
pub mod runner;
pub mod table;

pub use compute::Computation;
pub use progress::{ProgressSink, SilentProgress, TerminalProgress};
pub use record::Record;
pub use runner::{JobPool, PoolConfig, PoolConfigBuilder, PoolSize, RunSummary};
pub use table::{InputTable, OutputTable};
