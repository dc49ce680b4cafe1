use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::load_config::load_config;
use crate::provision::provision_all;

/// CLI for vault-provisioner: push declarative JSON payload trees into a
/// secrets engine.
#[derive(Parser)]
#[clap(
    name = "vault-provisioner",
    version,
    about = "Bulk-provision a secrets engine from a directory tree of JSON payloads"
)]
pub struct Cli {
    /// Load the token from the local token file instead of the parameter store
    #[clap(long, conflicts_with = "cluster")]
    pub local: bool,

    /// Name of the cluster whose root token to fetch from the parameter store
    #[clap(long)]
    pub cluster: Option<String>,

    /// Data root directory, one subdirectory per logical namespace
    #[clap(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Cap on simultaneous uploads (default: one task per payload file)
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Validate TLS certificates (off by default for self-signed listeners)
    #[clap(long)]
    pub verify_tls: bool,

    /// Per-request HTTP timeout in seconds
    #[clap(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    config.trace_loaded();

    println!("Provisioning starting...");
    match provision_all(&config).await {
        Ok(report) => {
            println!("Provisioning complete.\nReport:");
            println!("{:#?}", report);
            Ok(())
        }
        Err(e) => {
            eprintln!("[ERROR] Provisioning failed: {}", e);
            Err(e.into())
        }
    }
}
