use anyhow::Result;
use clap::Parser;
use vault_provisioner::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI.
    tracing_subscriber::fmt::init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("Provisioning run completed successfully"),
        Err(e) => tracing::error!(error = %e, "Provisioning run exited with error"),
    }
    result
}
