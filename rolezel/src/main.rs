//! Rolezel command line entry point

mod commands;

use clap::Parser;
use commands::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolezel=info,convenient_role=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { pipeline } => commands::build::execute(pipeline, false).await?,
        Commands::Context { pipeline } => commands::context::execute(pipeline).await?,
        Commands::Show {
            settings,
            role,
            artifact,
        } => commands::show::execute(settings, &role, artifact)?,
    }

    Ok(())
}
