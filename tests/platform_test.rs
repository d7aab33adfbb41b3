mod common;

use common::*;
use dataphonia_cli::api::{PlatformClient, Project};
use dataphonia_cli::Error;
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn login_session_cookie_is_sent_with_listing_calls() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    let login = mock_login(&mut server);
    let projects = server
        .mock("GET", "/projects/")
        .match_header("cookie", SESSION_COOKIE)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 55, "name": "Super Mega (projet de test)"}, {"id": 3, "name": "Nuit"}]"#)
        .create();

    let config = config_for(&server.url(), storage.path());
    let client = PlatformClient::login(&config).unwrap();
    let listed = client.list_projects().unwrap();

    login.assert();
    projects.assert();
    assert_eq!(
        listed,
        vec![
            Project { id: 55, name: "Super Mega (projet de test)".into() },
            Project { id: 3, name: "Nuit".into() },
        ]
    );
}

#[test]
fn rejected_login_is_an_authentication_error() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body("bad credentials")
        .create();

    let config = config_for(&server.url(), storage.path());
    let err = PlatformClient::login(&config).err().expect("login must fail");
    assert!(matches!(err, Error::Authentication(ref m) if m.contains("bad credentials")));
}

#[test]
fn unreachable_api_is_a_transfer_error() {
    let storage = TempDir::new().unwrap();
    // Nothing listens on port 9 (discard) on a test machine.
    let config = config_for("http://127.0.0.1:9", storage.path());
    let err = PlatformClient::login(&config).err().expect("login must fail");
    assert!(matches!(err, Error::Transfer(_)));
}

#[test]
fn bearer_token_from_login_is_used() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "tok-1"}"#)
        .create();
    let projects = server
        .mock("GET", "/projects/")
        .match_header("authorization", "Bearer tok-1")
        .with_status(200)
        .with_body("[]")
        .create();

    let config = config_for(&server.url(), storage.path());
    let client = PlatformClient::login(&config).unwrap();
    assert!(client.list_projects().unwrap().is_empty());
    projects.assert();
}

#[test]
fn find_file_takes_first_exact_match() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, storage.path());
    mock_files(
        &mut server,
        55,
        json!([
            {"id": 1, "name": "dawn.WAV", "s3Key": "x"},
            {"id": 2, "name": "dawn.wav", "s3Key": "first"},
            {"id": 3, "name": "dawn.wav", "s3Key": "second"}
        ]),
    );

    let record = client.find_file(55, "dawn.wav").unwrap();
    assert_eq!(record.id, 2);
    assert_eq!(record.storage_key.as_deref(), Some("first"));

    let err = client.find_file(55, "dusk.wav").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn raw_rows_keep_platform_field_order() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, storage.path());
    server
        .mock("GET", "/projects/8/files/")
        .with_status(200)
        .with_body(r#"[{"name": "a", "id": 1, "zeta": 0, "alpha": 1}]"#)
        .create();

    let rows = client.list_file_rows(8).unwrap();
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "id", "zeta", "alpha"]);
}

#[test]
fn server_errors_are_transfer_errors() {
    let mut server = Server::new();
    let storage = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, storage.path());
    server
        .mock("GET", "/projects/")
        .with_status(500)
        .with_body("boom")
        .create();
    server
        .mock("GET", Matcher::Regex(r"^/projects/404/files/$".into()))
        .with_status(404)
        .create();
    server
        .mock("GET", Matcher::Regex(r"^/projects/401/files/$".into()))
        .with_status(401)
        .with_body("session expired")
        .create();

    assert!(matches!(client.list_projects(), Err(Error::Transfer(_))));
    assert!(matches!(client.list_files(404), Err(Error::Transfer(_))));
    assert!(matches!(
        client.list_files(401),
        Err(Error::Transfer(ref m)) if m.contains("session expired")
    ));
}
