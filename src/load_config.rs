use tracing::{error, info};

use crate::cli::Cli;
use crate::config::{Config, CredentialSource};
use crate::error::ProvisionError;

/// Environment variable naming the secrets engine endpoint.
pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";

/// Merge the environment and CLI flags into one immutable [`Config`].
/// All pre-flight validation happens here, before any network activity.
pub fn load_config(cli: &Cli) -> Result<Config, ProvisionError> {
    let vault_addr = match std::env::var(VAULT_ADDR_ENV) {
        Ok(addr) if !addr.trim().is_empty() => addr,
        _ => {
            error!("{VAULT_ADDR_ENV} must be set within your environment");
            return Err(ProvisionError::Configuration(format!(
                "{VAULT_ADDR_ENV} must be set within your environment"
            )));
        }
    };

    let credential = if cli.local {
        CredentialSource::LocalFile
    } else {
        match cli.cluster.as_deref() {
            Some(name) if !name.is_empty() => CredentialSource::Cluster(name.to_owned()),
            _ => {
                error!("Must either use a local token or name a cluster holding the root token");
                return Err(ProvisionError::Configuration(
                    "must either use a local token (--local) or name a cluster (--cluster) \
                     holding the root token"
                        .into(),
                ));
            }
        }
    };

    let config = Config {
        vault_addr,
        credential,
        data_dir: cli.data_dir.clone(),
        concurrency: cli.concurrency,
        verify_tls: cli.verify_tls,
        timeout_secs: cli.timeout_secs,
    };
    info!(vault_addr = %config.vault_addr, "Configuration merged successfully");
    Ok(config)
}
