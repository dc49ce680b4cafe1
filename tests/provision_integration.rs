use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_provisioner::config::{Config, CredentialSource};
use vault_provisioner::provision::{provision_directory, UploadResult};
use vault_provisioner::vault::{OutcomeKind, VaultClient};
use vault_provisioner::ProvisionError;

fn config_for(base: String) -> Config {
    Config {
        vault_addr: base,
        credential: CredentialSource::LocalFile,
        data_dir: "data".into(),
        concurrency: None,
        verify_tls: true,
        timeout_secs: 5,
    }
}

fn client_for(server: &MockServer, token: &str) -> Arc<VaultClient> {
    Arc::new(VaultClient::new(&config_for(server.uri()), token.to_owned()).unwrap())
}

#[tokio::test]
async fn provisions_every_payload_with_trimmed_body_and_derived_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/secrets/db"))
        .and(header("x-vault-token", "test-token"))
        .and(body_string("{\"value\":\"x\"}"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/secrets/cache"))
        .and(header("x-vault-token", "test-token"))
        .and(body_string("{\"value\":\"y\"}"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let secrets = data.path().join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    fs::write(secrets.join("db.json"), "{\"value\":\"x\"}\n").unwrap();
    fs::write(secrets.join("cache.json"), "{\"value\":\"y\"}\n").unwrap();

    let client = client_for(&server, "test-token");
    let reports = provision_directory(client, data.path(), &secrets, None)
        .await
        .unwrap();

    // Exactly one outcome per discovered payload, all completed.
    assert_eq!(reports.len(), 2);
    let mut paths: Vec<&str> = reports.iter().map(|r| r.api_path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["secrets/cache", "secrets/db"]);
    for report in &reports {
        assert!(matches!(
            report.result,
            UploadResult::Completed {
                status: 204,
                kind: OutcomeKind::SuccessNoBody
            }
        ));
    }
}

#[tokio::test]
async fn nested_payloads_become_nested_logical_segments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/policies/teams/admins"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let nested = data.path().join("policies/teams");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("admins.json"), "{\"policy\":\"x\"}").unwrap();

    let client = client_for(&server, "t");
    let reports = provision_directory(client, data.path(), &data.path().join("policies"), None)
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].api_path, "policies/teams/admins");
}

#[tokio::test]
async fn sealed_engine_halts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let secrets = data.path().join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    for name in ["a.json", "b.json", "c.json"] {
        fs::write(secrets.join(name), "{}").unwrap();
    }

    let client = client_for(&server, "t");
    let err = provision_directory(client, data.path(), &secrets, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::ServiceUnavailable));
}

#[tokio::test]
async fn forbidden_and_not_found_do_not_abort_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ns/denied"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ns/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ns/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let ns = data.path().join("ns");
    fs::create_dir_all(&ns).unwrap();
    fs::write(ns.join("denied.json"), "{}").unwrap();
    fs::write(ns.join("missing.json"), "{}").unwrap();
    fs::write(ns.join("ok.json"), "{}").unwrap();

    let client = client_for(&server, "t");
    let reports = provision_directory(client, data.path(), &ns, None)
        .await
        .unwrap();

    assert_eq!(reports.len(), 3);
    let kind_of = |p: &str| {
        reports
            .iter()
            .find(|r| r.api_path == p)
            .map(|r| &r.result)
            .unwrap()
    };
    assert!(matches!(
        kind_of("ns/denied"),
        UploadResult::Completed {
            kind: OutcomeKind::Forbidden,
            ..
        }
    ));
    assert!(matches!(
        kind_of("ns/missing"),
        UploadResult::Completed {
            kind: OutcomeKind::NotFound,
            ..
        }
    ));
    assert!(matches!(
        kind_of("ns/ok"),
        UploadResult::Completed {
            kind: OutcomeKind::Success,
            ..
        }
    ));
}

#[tokio::test]
async fn unreadable_payload_fails_its_upload_after_siblings_settle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ns/good"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let ns = data.path().join("ns");
    fs::create_dir_all(&ns).unwrap();
    fs::write(ns.join("good.json"), "{}").unwrap();
    // Invalid UTF-8 makes the read itself fail.
    fs::write(ns.join("bad.json"), [0xff, 0xfe, 0xfd]).unwrap();

    let client = client_for(&server, "t");
    let err = provision_directory(client, data.path(), &ns, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::PayloadRead { .. }));
    // The wiremock expectation on /v1/ns/good verifies on drop that the
    // sibling upload still went through.
}

#[tokio::test]
async fn concurrency_cap_still_uploads_everything() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(4)
        .mount(&server)
        .await;

    let data = tempdir().unwrap();
    let ns = data.path().join("ns");
    fs::create_dir_all(&ns).unwrap();
    for name in ["a.json", "b.json", "c.json", "d.json"] {
        fs::write(ns.join(name), "{}").unwrap();
    }

    let client = client_for(&server, "t");
    let reports = provision_directory(client, data.path(), &ns, Some(1))
        .await
        .unwrap();
    assert_eq!(reports.len(), 4);
}
