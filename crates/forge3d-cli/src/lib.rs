//! Command-line front-end for forge3d.
//!
//! `main.rs` is the composition root: it parses arguments, builds a
//! [`CliContext`] through [`bootstrap`] and routes to one handler per
//! command. Handlers own the presentation; the runtime crate owns the work.

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod utils;

pub use bootstrap::{CliContext, bootstrap, init_tracing};
pub use commands::{Commands, GenerateArgs, InstallArgs, RecoveryChoice};
pub use config_commands::ConfigCommand;
pub use parser::Cli;
