//! Credential resolution: local token file or remote parameter store.

use std::path::Path;

use tracing::{error, info};

use crate::config::CredentialSource;
use crate::error::ProvisionError;
use crate::param_store::{ParameterLookup, SsmParameterStore};

/// Fixed token file name in the invoking user's home directory.
pub const TOKEN_FILE_NAME: &str = ".vault-token";

/// Suffix of the per-cluster root token parameter.
pub const ROOT_TOKEN_SUFFIX: &str = ".roottoken";

/// Resolve the bearer token for this run. Exactly one branch executes; the
/// local branch never opens a store session and the remote branch never
/// touches the local token file.
pub async fn resolve(source: &CredentialSource) -> Result<String, ProvisionError> {
    match source {
        CredentialSource::LocalFile => read_local_token(),
        CredentialSource::Cluster(name) => {
            let store = SsmParameterStore::connect().await.map_err(|e| {
                error!(error = %e, "Could not establish a parameter store session");
                ProvisionError::CredentialUnavailable(format!(
                    "cannot establish a parameter store session: {e}"
                ))
            })?;
            lookup_cluster_token(&store, name).await
        }
    }
}

/// Read the token from `$HOME/.vault-token`.
pub fn read_local_token() -> Result<String, ProvisionError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ProvisionError::CredentialUnavailable("could not determine the home directory".into())
    })?;
    read_token_file(&home)
}

fn read_token_file(dir: &Path) -> Result<String, ProvisionError> {
    let path = dir.join(TOKEN_FILE_NAME);
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        error!(path = %path.display(), error = %e, "Could not read local token file");
        ProvisionError::CredentialUnavailable(format!(
            "cannot read token file {}: {e}",
            path.display()
        ))
    })?;

    let token = raw.trim_end().to_owned();
    if token.is_empty() {
        return Err(ProvisionError::CredentialUnavailable(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    info!(path = %path.display(), token_len = token.len(), "Loaded token from local file");
    Ok(token)
}

/// Look up `<cluster>.roottoken` through the parameter store.
pub async fn lookup_cluster_token(
    store: &dyn ParameterLookup,
    cluster: &str,
) -> Result<String, ProvisionError> {
    let key = format!("{cluster}{ROOT_TOKEN_SUFFIX}");
    let params = store
        .get(std::slice::from_ref(&key))
        .await
        .map_err(|e| {
            error!(key = %key, error = %e, "Root token lookup failed");
            ProvisionError::CredentialUnavailable(format!("root token lookup failed: {e}"))
        })?;

    // The store omits absent names, so defend against an empty result.
    let param = params.into_iter().next().ok_or_else(|| {
        error!(key = %key, "Root token parameter absent from the store");
        ProvisionError::CredentialUnavailable(format!("no parameter named {key} in the store"))
    })?;

    info!(key = %key, token_len = param.value.len(), "Loaded root token from parameter store");
    Ok(param.value)
}
