pub mod collector;
pub mod config;
pub mod format;
pub mod pool;
pub mod sign;
pub mod utils;

pub use collector::{DrainPolicy, SubmitError, WindowedBatchCollector};
pub use config::{CollectorConfig, ConfigError, PoolConfig, WindrowConfig};
pub use pool::snapshot::{ExecutionSnapshot, PoolCounters, Reporter, StdoutReporter};
pub use pool::{ExecuteError, InstrumentedWorkerPool};
pub use sign::SignInConfig;
pub use utils::error::WindrowError;
