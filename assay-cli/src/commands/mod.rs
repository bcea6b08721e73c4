//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;

pub use job::SubmitArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job and wait for its result
    Submit(SubmitArgs),
    /// Show the current record of a job
    Status {
        /// Job ID or unambiguous prefix
        id: String,

        /// Delete the record on the server if it is terminal
        #[arg(long)]
        cleanup: bool,
    },
    /// List stored job IDs
    List,
    /// Delete a job record
    Delete {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Delete finished jobs
    Purge {
        /// Only jobs that completed at least this long ago
        #[arg(long, default_value_t = 0)]
        older_than_secs: u32,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = assay_client::AssayClient::new(&config.orchestrator_url);

    match command {
        Commands::Submit(args) => job::submit_job(&client, args).await,
        Commands::Status { id, cleanup } => job::show_status(&client, &id, cleanup).await,
        Commands::List => job::list_jobs(&client).await,
        Commands::Delete { id } => job::delete_job(&client, &id).await,
        Commands::Purge { older_than_secs } => job::purge_jobs(&client, older_than_secs).await,
    }
}
