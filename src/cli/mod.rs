use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "module-progress")]
#[command(about = "Track each user's progression through an ordered module catalog")]
#[command(long_about = "module-progress keeps every user on a linear path through an ordered set of \
                       learning modules. Completing the active module unlocks the next one; \
                       everything after stays locked until the user gets there.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the module catalog in sequence order
    Catalog {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective status of every module for a user
    Status {
        /// User to project progress for
        #[arg(long, short = 'u')]
        user: String,
        /// Print the projection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a user's active module as done and unlock the next one
    Complete {
        /// User completing the module
        #[arg(long, short = 'u')]
        user: String,
        /// Module being completed
        #[arg(long, short = 'm')]
        module: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Give a user an explicit active record for the first module
    Enroll {
        /// User to enroll
        #[arg(long, short = 'u')]
        user: String,
    },
    /// Check whether a user may open a module
    Open {
        /// User asking for access
        #[arg(long, short = 'u')]
        user: String,
        /// Module to open
        #[arg(long, short = 'm')]
        module: String,
        /// Print the access decision as JSON
        #[arg(long)]
        json: bool,
    },
}
