use anyhow::Context;
use arbwatch::cli::{check, run, Cli, Commands};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    // Both reqwest and tokio-tungstenite pull in rustls; pick one provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run(args) => run::execute(&cli, args)
            .await
            .with_context(|| format!("run failed (config {})", cli.config.display()))?,
        Commands::CheckConfig => check::execute(&cli)
            .with_context(|| format!("invalid configuration {}", cli.config.display()))?,
    }
    Ok(())
}
