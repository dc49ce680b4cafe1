//! Thin typed client over the remote parameter store (AWS SSM).
//!
//! Holds only the bootstrap root token for clusters; one batched `Get` per
//! run, nothing cached.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use aws_sdk_ssm::operation::get_parameters::GetParametersError;
use mockall::automock;
use tracing::{debug, info};

use crate::error::ProvisionError;

/// A key/value pair fetched from the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Batched lookup of parameter names against the store.
///
/// Implemented by the real SSM-backed store and by test mocks. Absent names
/// are omitted from the result, so callers must tolerate a shorter result
/// than request.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ParameterLookup: Send + Sync {
    async fn get(&self, names: &[String]) -> Result<Vec<Parameter>, ProvisionError>;
}

/// Parameter store backed by AWS SSM with ambient credentials.
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
    /// Working directory prefix for relative parameter paths.
    cwd: String,
    /// Request server-side decryption of secure parameters.
    decrypt: bool,
}

impl SsmParameterStore {
    /// Establish a session from the ambient AWS environment (shared config,
    /// env credentials, instance profile, ...).
    pub async fn connect() -> Result<Self, ProvisionError> {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        if shared.credentials_provider().is_none() {
            return Err(ProvisionError::StoreUnavailable(
                "no ambient AWS credentials were resolved".into(),
            ));
        }
        Ok(Self {
            client: aws_sdk_ssm::Client::new(&shared),
            cwd: "/".to_owned(),
            decrypt: true,
        })
    }
}

#[async_trait]
impl ParameterLookup for SsmParameterStore {
    async fn get(&self, names: &[String]) -> Result<Vec<Parameter>, ProvisionError> {
        let qualified: Vec<String> = names.iter().map(|n| qualify(n, &self.cwd)).collect();
        debug!(names = ?qualified, decrypt = self.decrypt, "Fetching parameters from store");

        let resp = self
            .client
            .get_parameters()
            .set_names(Some(qualified))
            .with_decryption(self.decrypt)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        if !resp.invalid_parameters().is_empty() {
            info!(
                invalid = ?resp.invalid_parameters(),
                "Requested parameters absent from the store"
            );
        }

        let mut found = Vec::new();
        for p in resp.parameters() {
            if let (Some(name), Some(value)) = (p.name(), p.value()) {
                found.push(Parameter {
                    name: name.to_owned(),
                    value: value.to_owned(),
                });
            }
        }
        Ok(found)
    }
}

fn classify_sdk_error(err: SdkError<GetParametersError>) -> ProvisionError {
    let detail = DisplayErrorContext(&err).to_string();
    if err.as_service_error().is_some() {
        ProvisionError::StoreRequest(detail)
    } else {
        // Dispatch, timeout and construction failures all mean the channel
        // to the store could not be used at all.
        ProvisionError::StoreUnavailable(detail)
    }
}

/// Qualify a parameter path: absolute paths pass through, relative paths are
/// prefixed with `cwd`, and the result is lexically cleaned. Purely textual;
/// never touches the filesystem or the network.
pub fn qualify(path: &str, cwd: &str) -> String {
    let dirty = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{}/{}", cwd.trim_end_matches('/'), path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in dirty.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
