use clap::{Parser, Subcommand};

/// Gatekeeper — request access and wait for an administrator to approve it
#[derive(Parser)]
#[command(name = "gatekeeper", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a new access request and wait for approval
    Request,

    /// Wait for approval of a code you already have
    Use {
        /// Access code, e.g. 40231
        code: String,
    },

    /// List saved access codes
    Codes,
}
