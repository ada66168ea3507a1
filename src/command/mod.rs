mod call;
mod index;
mod tools;

pub use call::run_call;
pub use index::run_index;
pub use tools::run_tools;
