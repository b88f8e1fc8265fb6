use anyhow::Result;
use chorewarden::cli::{Cli, Commands};
use chorewarden::{app, Config};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => app::run_check_cycle(&config).await,
        Commands::Sections => app::list_sections(&config).await,
        Commands::Check => app::check_connectivity(&config).await,
        Commands::Config => {
            app::show_config(&config);
            Ok(())
        }
    }
}
