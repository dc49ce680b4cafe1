//! HTTP client for the secrets engine's provisioning API.
//!
//! Every payload is POSTed to `<base>/v1/<path>` with the bearer token in
//! the `X-Vault-Token` header. Status codes are classified for operator
//! visibility; only 503 (sealed/maintenance) and transport failures steer
//! control flow.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ProvisionError;

/// Header carrying the bearer token.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Fixed API version segment between the base address and the logical path.
pub const API_VERSION_SEGMENT: &str = "v1";

/// Classified result of one completed API exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    /// 200, body returned.
    Success,
    /// 204, no body.
    SuccessNoBody,
    /// 403, token not allowed to make this request.
    Forbidden,
    /// 404, path not known to the engine.
    NotFound,
    /// Any other non-fatal status code.
    Unrecognized,
}

/// Outcome of one upload call: status, response body, classification.
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    pub api_path: String,
    pub status: u16,
    pub body: String,
    pub kind: OutcomeKind,
}

/// Authenticated client for the secrets engine. One instance per run,
/// shared across all upload tasks; the underlying transport is stateless
/// per request and safe for concurrent use.
pub struct VaultClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl VaultClient {
    pub fn new(config: &Config, token: String) -> Result<Self, ProvisionError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs));
        if !config.verify_tls {
            warn!("TLS certificate validation is disabled; pass --verify-tls to enable it");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(|e| {
            ProvisionError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            http,
            base_url: config.vault_addr.trim_end_matches('/').to_owned(),
            token,
        })
    }

    /// POST one JSON payload to the given logical path.
    ///
    /// Returns `Ok` for every completed exchange except 503, which is fatal
    /// to the run, as is any failure to complete the exchange at all.
    pub async fn post(&self, api_path: &str, payload: &str) -> Result<CallOutcome, ProvisionError> {
        let url = format!("{}/{}/{}", self.base_url, API_VERSION_SEGMENT, api_path);

        let resp = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_owned())
            .send()
            .await
            .map_err(|e| ProvisionError::Transport {
                path: api_path.to_owned(),
                source: e,
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| ProvisionError::Transport {
            path: api_path.to_owned(),
            source: e,
        })?;

        let kind = match status {
            200 => {
                info!(path = %api_path, body = %body, "Completed successfully, engine returned data");
                OutcomeKind::Success
            }
            204 => {
                info!(path = %api_path, "Completed successfully, no data returned");
                OutcomeKind::SuccessNoBody
            }
            403 => {
                warn!(path = %api_path, "Forbidden to make this request with the current token");
                OutcomeKind::Forbidden
            }
            404 => {
                warn!(path = %api_path, body = %body, "Path not found, check the API documentation");
                OutcomeKind::NotFound
            }
            503 => {
                error!(
                    path = %api_path,
                    "Engine is in maintenance mode or sealed, stopping all provisioning"
                );
                return Err(ProvisionError::ServiceUnavailable);
            }
            other => {
                warn!(path = %api_path, status = other, body = %body, "Unrecognized response code");
                OutcomeKind::Unrecognized
            }
        };

        Ok(CallOutcome {
            api_path: api_path.to_owned(),
            status,
            body,
            kind,
        })
    }
}
