//! External process execution.
//!
//! - `runner`: [`TokioCommandRunner`], the `CommandRunner` adapter
//! - `stream`: byte-oriented line readers (non-UTF-8 safe)
//! - `shutdown`: group kill and reaping on timeout or cancellation
//! - `toolkit`: accelerator toolkit discovery and child environment
//! - `pythonpath`: `PYTHONPATH` assembly for generator processes

mod pythonpath;
mod runner;
mod shutdown;
mod stream;
mod toolkit;

pub use pythonpath::build_pythonpath;
pub use runner::TokioCommandRunner;
pub use shutdown::terminate_tree;
pub use toolkit::{ToolkitLocation, ToolkitLocator};
