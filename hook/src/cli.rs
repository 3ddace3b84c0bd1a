//! CLI argument definitions using clap
//!
//! Commands:
//! - ncunit-hook handle --event <json> --role <role> --unit <id> --ingress-address <addr>
//! - ncunit-hook status

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ncunit::Role;

/// Runs one reconciliation of a Nextcloud unit per host event.
#[derive(Parser, Debug)]
#[command(name = "ncunit-hook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Unit configuration (YAML or JSON). Defaults apply when absent.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Filesystem prefix for every managed path.
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handle one event and print the JSON report
    Handle {
        /// The event, e.g. '{"kind":"config_changed"}'
        #[arg(long)]
        event: String,

        #[arg(long)]
        role: Role,

        /// Unit identity, e.g. nextcloud/0
        #[arg(long)]
        unit: String,

        #[arg(long, default_value = "")]
        ingress_address: String,

        /// Local replica of the peer relation
        #[arg(long)]
        peer_store: Option<PathBuf>,
    },

    /// Print the status projected from the persisted state
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
