//! Offload of CPU-bound analysis with an in-process fallback.

mod pool;
mod task;

pub use pool::{Offloaded, WorkerPool};
pub use task::{batch_entry, SourceFile, WorkerTask};
