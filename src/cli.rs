use clap::{Parser, Subcommand};

/// `chorewarden` - Chore-gated internet access control.
#[derive(Parser, Debug)]
#[command(name = "chorewarden")]
#[command(version)]
#[command(
    about = "Gates firewall rules on Todoist chore completion.",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one check cycle: evaluate the roster and apply rule changes (default)
    Run,

    /// List Todoist projects and sections to find section ids
    Sections,

    /// Verify connectivity and credentials for both services
    Check,

    /// Print the effective non-secret configuration
    Config,
}
