//! Configuration management subcommands.

use clap::Subcommand;

/// Configuration management commands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all current settings
    Show {
        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },
    /// Change one setting and save it
    Set {
        /// Setting name, e.g. installation_mode or steps
        key: String,
        value: String,
    },
    /// Print the settings file location
    Path,
}
