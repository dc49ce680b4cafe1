//! Directory walking and concurrent payload dispatch.
//!
//! One run provisions the immediate subdirectories of the data root
//! strictly in sequence; within a directory, every discovered payload file
//! is uploaded by its own task. The only coordination between sibling
//! uploads is a wait-for-all barrier plus a broadcast cancel signal for
//! fatal conditions, so payload authors must not rely on upload ordering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ProvisionError;
use crate::token;
use crate::vault::{OutcomeKind, VaultClient};

/// Recognized payload file suffix.
pub const PAYLOAD_SUFFIX: &str = ".json";

/// End-of-run report: one entry per provisioned directory.
#[derive(Debug, Serialize)]
pub struct ProvisionReport {
    pub directories: Vec<DirectoryReport>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryReport {
    pub directory: String,
    pub uploads: Vec<UploadReport>,
}

/// Terminal outcome for one discovered payload file.
#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub api_path: String,
    pub result: UploadResult,
}

#[derive(Debug, Serialize)]
pub enum UploadResult {
    /// The HTTP exchange completed; see the classified kind.
    Completed { status: u16, kind: OutcomeKind },
    /// The payload file could not be opened or read.
    ReadFailed { detail: String },
    /// The call hit a fatal condition (sealed engine, transport failure).
    Fatal { detail: String },
    /// Cancelled before completion because a sibling hit a fatal condition.
    Aborted,
}

/// Orchestrate a full run: resolve the credential, then provision each
/// immediate subdirectory of the data root in sequence, stopping at the
/// first error.
pub async fn provision_all(config: &Config) -> Result<ProvisionReport, ProvisionError> {
    let token = token::resolve(&config.credential).await?;
    info!(
        vault_addr = %config.vault_addr,
        token_len = token.len(),
        "Connecting to secrets engine"
    );
    let client = Arc::new(VaultClient::new(config, token)?);

    let directories = list_namespace_dirs(&config.data_dir)?;
    if directories.is_empty() {
        warn!(data_dir = %config.data_dir.display(), "Data root contains no directories");
    }

    let mut report = ProvisionReport {
        directories: Vec::with_capacity(directories.len()),
    };
    for dir in directories {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(directory = %name, "Provisioning directory");
        let uploads =
            provision_directory(Arc::clone(&client), &config.data_dir, &dir, config.concurrency)
                .await?;
        report.directories.push(DirectoryReport {
            directory: name,
            uploads,
        });
    }
    Ok(report)
}

/// Immediate subdirectories of the data root, lexically sorted.
fn list_namespace_dirs(root: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        ProvisionError::Configuration(format!("cannot read data root {}: {e}", root.display()))
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ProvisionError::Configuration(format!("cannot read data root {}: {e}", root.display()))
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Upload every payload file under `dir`, one task per file. Returns once
/// every task has settled, so each discovered file has exactly one outcome.
pub async fn provision_directory(
    client: Arc<VaultClient>,
    base: &Path,
    dir: &Path,
    concurrency: Option<usize>,
) -> Result<Vec<UploadReport>, ProvisionError> {
    let files = discover_payloads(dir)?;
    info!(
        directory = %dir.display(),
        count = files.len(),
        "Discovered payload files"
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_tx = Arc::new(cancel_tx);
    let semaphore = concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));

    let mut handles = Vec::with_capacity(files.len());
    for file in files {
        let api_path = logical_path(base, &file);
        handles.push(tokio::spawn(upload_one(
            Arc::clone(&client),
            file,
            api_path,
            Arc::clone(&cancel_tx),
            cancel_rx.clone(),
            semaphore.clone(),
        )));
    }

    let mut reports = Vec::with_capacity(handles.len());
    let mut fatal: Option<ProvisionError> = None;
    let mut read_failure: Option<ProvisionError> = None;

    for joined in join_all(handles).await {
        match joined {
            Ok((report, maybe_err)) => {
                reports.push(report);
                if let Some(e) = maybe_err {
                    if e.is_fatal_to_run() {
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    } else if read_failure.is_none() {
                        read_failure = Some(e);
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Upload task did not run to completion");
                if fatal.is_none() {
                    fatal = Some(ProvisionError::TaskFailure(e.to_string()));
                }
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }
    // Read failures are reported only after every sibling has settled;
    // siblings are not cancelled for them.
    if let Some(e) = read_failure {
        return Err(e);
    }
    Ok(reports)
}

async fn upload_one(
    client: Arc<VaultClient>,
    file: PathBuf,
    api_path: String,
    cancel_tx: Arc<watch::Sender<bool>>,
    mut cancel_rx: watch::Receiver<bool>,
    semaphore: Option<Arc<Semaphore>>,
) -> (UploadReport, Option<ProvisionError>) {
    let aborted = |path: &str| {
        debug!(path = %path, "Upload aborted before completion");
        (
            UploadReport {
                api_path: path.to_owned(),
                result: UploadResult::Aborted,
            },
            None,
        )
    };

    let _permit = match semaphore {
        Some(s) => {
            tokio::select! {
                permit = s.acquire_owned() => match permit {
                    Ok(p) => Some(p),
                    Err(_) => return aborted(&api_path),
                },
                _ = cancel_rx.changed() => return aborted(&api_path),
            }
        }
        None => None,
    };
    if *cancel_rx.borrow() {
        return aborted(&api_path);
    }

    let raw = match tokio::fs::read_to_string(&file).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(file = %file.display(), error = %e, "Failed to read payload file");
            let report = UploadReport {
                api_path,
                result: UploadResult::ReadFailed {
                    detail: e.to_string(),
                },
            };
            return (report, Some(ProvisionError::PayloadRead { path: file, source: e }));
        }
    };
    let payload = trim_payload(&raw);

    let call = tokio::select! {
        res = client.post(&api_path, payload) => res,
        _ = cancel_rx.changed() => return aborted(&api_path),
    };

    match call {
        Ok(outcome) => {
            if let Ok(json) = serde_json::to_string_pretty(&outcome) {
                debug!(json = %json, "Upload outcome");
            }
            (
                UploadReport {
                    api_path: outcome.api_path,
                    result: UploadResult::Completed {
                        status: outcome.status,
                        kind: outcome.kind,
                    },
                },
                None,
            )
        }
        Err(e) => {
            // Fatal condition: tell every sibling to stop.
            cancel_tx.send_replace(true);
            let report = UploadReport {
                api_path,
                result: UploadResult::Fatal {
                    detail: e.to_string(),
                },
            };
            (report, Some(e))
        }
    }
}

/// Every file under `dir`, any depth, whose name ends in the payload suffix.
pub fn discover_payloads(dir: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
    fn visit_dir(dir: &Path, results: &mut Vec<PathBuf>) -> Result<(), ProvisionError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ProvisionError::PayloadRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| ProvisionError::PayloadRead {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                visit_dir(&path, results)?;
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PAYLOAD_SUFFIX))
            {
                results.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(dir, &mut files)?;
    files.sort();
    Ok(files)
}

/// Logical API path for a payload file: its path relative to `base`, with
/// the payload suffix stripped and `/` as the separator. Pure function of
/// its inputs.
pub fn logical_path(base: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(base).unwrap_or(file);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    joined
        .strip_suffix(PAYLOAD_SUFFIX)
        .unwrap_or(&joined)
        .to_owned()
}

/// Trim at most one trailing newline; everything else stays untouched.
pub fn trim_payload(raw: &str) -> &str {
    raw.strip_suffix('\n').unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_path_strips_suffix_and_keeps_separators() {
        let base = Path::new("/data");
        let file = Path::new("/data/a/b/secret.json");
        assert_eq!(logical_path(base, file), "a/b/secret");
    }

    #[test]
    fn logical_path_for_top_level_file() {
        assert_eq!(
            logical_path(Path::new("data"), Path::new("data/secrets/db.json")),
            "secrets/db"
        );
    }

    #[test]
    fn trim_payload_removes_at_most_one_newline() {
        assert_eq!(trim_payload("{\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(trim_payload("{\"a\":1}\n\n"), "{\"a\":1}\n");
        assert_eq!(trim_payload("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(trim_payload("{\"a\":1}  \n"), "{\"a\":1}  ");
        assert_eq!(trim_payload(""), "");
    }

    #[test]
    fn discover_payloads_descends_and_filters_by_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("top.json"), "{}").unwrap();
        std::fs::write(root.join("a/mid.json"), "{}").unwrap();
        std::fs::write(root.join("a/b/deep.json"), "{}").unwrap();
        std::fs::write(root.join("a/readme.md"), "nope").unwrap();

        let files = discover_payloads(root).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| logical_path(root, f))
            .collect();
        assert_eq!(names, vec!["a/b/deep", "a/mid", "top"]);
    }

    #[test]
    fn discover_payloads_on_missing_dir_is_read_error() {
        let err = discover_payloads(Path::new("/nonexistent-vault-data")).unwrap_err();
        assert!(matches!(err, ProvisionError::PayloadRead { .. }));
    }
}
