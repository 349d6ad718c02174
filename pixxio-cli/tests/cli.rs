use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pixxio(base_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pixxio").unwrap();
    cmd.current_dir(base_path).env_remove("RUST_LOG");
    cmd
}

fn init(base_path: &Path) {
    pixxio(base_path).arg("init").assert().success();
}

fn write_config(base_path: &Path, server: &MockServer) {
    fs::write(
        base_path.join(".pixxio/config.yaml"),
        format!("apiEndpointUri: {}\napiKey: api-key\n", server.uri()),
    )
    .unwrap();
}

/// Mock pixx.io accepting refresh token `refresh-1` and serving two files.
fn start_remote(rt: &Runtime) -> MockServer {
    let server = rt.block_on(MockServer::start());
    let mocks = [
        Mock::given(method("POST"))
            .and(path("/api/v1/accessToken"))
            .and(body_string_contains("refreshToken=refresh-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true, "accessToken": "token-1" })),
            ),
        Mock::given(method("GET"))
            .and(path("/api/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "quantity": 2,
                "files": [
                    { "id": 1, "fileName": "alpha.jpg", "fileType": "jpg", "subject": "Alpha" },
                    { "id": 2, "fileName": "beta.pdf", "fileType": "pdf", "subject": "Beta" }
                ]
            }))),
        Mock::given(method("GET"))
            .and(path("/api/v1/files/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "file": {
                    "id": 2, "fileName": "beta.pdf", "fileType": "pdf", "subject": "Beta",
                    "keywords": ["report"]
                }
            }))),
        Mock::given(method("GET"))
            .and(path("/api/v1/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "categories": ["Marketing", "Press"]
            }))),
    ];
    for mock in mocks {
        rt.block_on(mock.mount(&server));
    }
    server
}

#[test]
fn test_init_creates_project_files() {
    let dir = tempdir().unwrap();
    init(dir.path());

    assert_eq!(
        fs::read_to_string(dir.path().join(".pixxio/secrets.json")).unwrap(),
        "{}"
    );
    assert!(dir.path().join(".pixxio/config.yaml").exists());
}

#[test]
fn test_commands_require_init() {
    let dir = tempdir().unwrap();
    pixxio(dir.path())
        .args(["token", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pixxio init"));
}

#[test]
fn test_token_set_ls_rm() {
    let dir = tempdir().unwrap();
    init(dir.path());

    pixxio(dir.path())
        .args(["token", "set", "editor", "refresh-1"])
        .assert()
        .success();
    pixxio(dir.path())
        .args(["token", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- editor"));

    let stored = fs::read_to_string(dir.path().join(".pixxio/secrets.json")).unwrap();
    assert!(!stored.contains("refresh-1"));

    pixxio(dir.path())
        .args(["token", "rm", "editor"])
        .assert()
        .success();
    pixxio(dir.path())
        .args(["token", "rm", "editor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("editor"));
}

#[test]
fn test_connect_without_credentials_fails() {
    let rt = Runtime::new().unwrap();
    let server = start_remote(&rt);
    let dir = tempdir().unwrap();
    init(dir.path());
    write_config(dir.path(), &server);

    pixxio(dir.path())
        .args(["connect", "--account", "editor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no client secret found for account editor"));
}

#[test]
fn test_connect_lists_categories() {
    let rt = Runtime::new().unwrap();
    let server = start_remote(&rt);
    let dir = tempdir().unwrap();
    init(dir.path());
    write_config(dir.path(), &server);
    pixxio(dir.path())
        .args(["token", "set", "shared", "refresh-1"])
        .assert()
        .success();

    pixxio(dir.path())
        .arg("connect")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connected to pixx.io"))
        .stdout(predicate::str::contains("2 categories available."));
}

#[test]
fn test_search_documents_only() {
    let rt = Runtime::new().unwrap();
    let server = start_remote(&rt);
    let dir = tempdir().unwrap();
    init(dir.path());
    write_config(dir.path(), &server);
    pixxio(dir.path())
        .args(["token", "set", "shared", "refresh-1"])
        .assert()
        .success();

    pixxio(dir.path())
        .args(["search", "--type", "document"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beta"))
        .stdout(predicate::str::contains("Alpha").not())
        .stdout(predicate::str::contains("1 of 2 total matches shown."));
}

#[test]
fn test_show_as_json() {
    let rt = Runtime::new().unwrap();
    let server = start_remote(&rt);
    let dir = tempdir().unwrap();
    init(dir.path());
    write_config(dir.path(), &server);
    pixxio(dir.path())
        .args(["token", "set", "editor", "refresh-1"])
        .assert()
        .success();

    let output = pixxio(dir.path())
        .args(["show", "2", "--json", "--account", "editor"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["identifier"], "2");
    assert_eq!(record["label"], "Beta");
    assert_eq!(record["remoteMediaType"], "application/pdf");
    assert_eq!(record["tags"], json!(["report"]));
}

#[test]
fn test_tag_with_auto_tagging_disabled() {
    let rt = Runtime::new().unwrap();
    let server = start_remote(&rt);
    let dir = tempdir().unwrap();
    init(dir.path());
    write_config(dir.path(), &server);
    pixxio(dir.path())
        .args(["token", "set", "shared", "refresh-1"])
        .assert()
        .success();

    pixxio(dir.path())
        .args(["tag", "2", "--usage-count", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Auto tagging is disabled."));
}
