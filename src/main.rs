mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jest_test_tree=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli::load_settings(&cli.workspace, cli.settings.as_deref(), cli.jest)?;

    match cli.command {
        Commands::Tree { json } => {
            cli::show_tree(&cli.workspace, settings, json).await?;
        }
        Commands::Run { ids } => {
            cli::run_tests(&cli.workspace, settings, ids).await?;
        }
        Commands::Watch => {
            cli::watch_workspace(&cli.workspace, settings).await?;
        }
        Commands::Projects { json } => {
            cli::list_projects(&cli.workspace, settings, json).await?;
        }
    }

    Ok(())
}
