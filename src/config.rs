use std::path::PathBuf;
use tracing::info;

/// Immutable configuration for one provisioning run.
///
/// Built once at startup by [`crate::load_config::load_config`] and passed
/// by reference into every component; nothing re-reads the environment
/// mid-run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the secrets engine, e.g. `https://vault.internal:8200`.
    pub vault_addr: String,
    /// Where the bootstrap token comes from.
    pub credential: CredentialSource,
    /// Root directory holding one subdirectory per logical namespace.
    pub data_dir: PathBuf,
    /// Optional cap on simultaneous uploads; `None` spawns one task per file.
    pub concurrency: Option<usize>,
    /// Validate TLS certificates. Off by default: internal clusters run
    /// self-signed listeners.
    pub verify_tls: bool,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            vault_addr = %self.vault_addr,
            data_dir = %self.data_dir.display(),
            concurrency = ?self.concurrency,
            verify_tls = self.verify_tls,
            timeout_secs = self.timeout_secs,
            "Loaded Config"
        );
        self.credential.trace_loaded();
    }
}

/// Which of the two mutually exclusive credential paths this run uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read `$HOME/.vault-token` from the invoking user's home directory.
    LocalFile,
    /// Look up `<cluster>.roottoken` in the remote parameter store.
    Cluster(String),
}

impl CredentialSource {
    pub fn trace_loaded(&self) {
        match self {
            CredentialSource::LocalFile => {
                info!("Loading token from local token file");
            }
            CredentialSource::Cluster(name) => {
                info!(cluster = %name, "Loading root token from parameter store");
            }
        }
    }
}
