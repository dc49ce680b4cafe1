use std::path::PathBuf;

/// Error taxonomy for a provisioning run.
///
/// Pre-flight failures (`Configuration`, `CredentialUnavailable`,
/// `StoreUnavailable`, `StoreRequest`) abort before any upload begins.
/// `PayloadRead` is fatal to its own upload only; the remaining variants
/// halt the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("parameter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("parameter store request failed: {0}")]
    StoreRequest(String),

    #[error("failed to read payload file {path}: {source}")]
    PayloadRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("transport failure while posting to {path}: {source}")]
    Transport {
        path: String,
        source: reqwest::Error,
    },

    #[error("secrets engine is sealed or in maintenance mode")]
    ServiceUnavailable,

    #[error("upload task did not complete: {0}")]
    TaskFailure(String),
}

impl ProvisionError {
    /// Whether this error must halt all remaining work, as opposed to
    /// failing a single upload.
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(self, ProvisionError::PayloadRead { .. })
    }
}
