mod common;

use common::*;
use dataphonia_cli::api::SessionStatus;
use dataphonia_cli::bucket::normalize;
use dataphonia_cli::download::Downloader;
use dataphonia_cli::export::export_project;
use dataphonia_cli::outcome::Outcome;
use dataphonia_cli::storage::{LocalStore, ObjectStore};
use dataphonia_cli::upload::{ApiMediatedUpload, DirectUpload, UploadProtocol, UploadTarget};
use dataphonia_cli::Error;
use mockito::{Matcher, Server};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn target(key: &str) -> UploadTarget {
    UploadTarget {
        project_id: 55,
        bucket: normalize(55, "Super Mega (projet de test)"),
        key: key.into(),
    }
}

#[test]
fn api_mediated_upload_runs_the_four_steps_in_order() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let src = dir.path().join("dawn.wav");
    fs::write(&src, "signed payload").unwrap();

    let initiate = server
        .mock("POST", "/projects/55/uploads")
        .match_header("cookie", SESSION_COOKIE)
        .match_body(Matcher::Json(json!({
            "name": "dawn.wav",
            "size": 14,
            "mimeType": "audio/wav"
        })))
        .with_status(201)
        .with_body(r#"{"id": 7, "status": "pending"}"#)
        .create();
    let target_url = format!("{}/signed/abc", server.url());
    let obtain = server
        .mock("GET", "/uploads/7/target")
        .with_status(200)
        .with_body(json!({ "url": target_url }).to_string())
        .create();
    let put = server
        .mock("PUT", "/signed/abc")
        .match_header("cookie", Matcher::Missing)
        .match_header("content-type", "audio/wav")
        .match_body("signed payload")
        .with_status(200)
        .create();
    let finalize = server
        .mock("PATCH", "/uploads/7")
        .match_body(Matcher::Json(json!({"status": "completed"})))
        .with_status(200)
        .with_body(r#"{"id": 7, "status": "completed"}"#)
        .create();

    let receipt = ApiMediatedUpload::new(&client)
        .upload(&src, &target("dawn.wav"))
        .unwrap();

    initiate.assert();
    obtain.assert();
    put.assert();
    finalize.assert();
    assert_eq!(receipt.bytes, 14);
    let session = receipt.session.unwrap();
    assert_eq!(session.id, 7);
    assert_eq!(session.status, SessionStatus::Completed);
}

#[test]
fn failed_transfer_target_never_finalizes() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let src = dir.path().join("dawn.wav");
    fs::write(&src, "bytes").unwrap();

    server
        .mock("POST", "/projects/55/uploads")
        .with_status(201)
        .with_body(r#"{"id": 8, "status": "pending"}"#)
        .create();
    server
        .mock("GET", "/uploads/8/target")
        .with_status(503)
        .with_body("signing service down")
        .create();
    let put = server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create();
    let finalize = server
        .mock("PATCH", "/uploads/8")
        .expect(0)
        .create();

    let err = ApiMediatedUpload::new(&client)
        .upload(&src, &target("dawn.wav"))
        .unwrap_err();

    assert!(matches!(err, Error::Transfer(ref m) if m.contains("503")));
    put.assert();
    finalize.assert();
}

#[test]
fn failed_initiate_stops_before_anything_else() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let src = dir.path().join("dawn.wav");
    fs::write(&src, "bytes").unwrap();

    server
        .mock("POST", "/projects/55/uploads")
        .with_status(500)
        .create();
    let obtain = server
        .mock("GET", Matcher::Regex("^/uploads/".into()))
        .expect(0)
        .create();

    let err = ApiMediatedUpload::new(&client)
        .upload(&src, &target("dawn.wav"))
        .unwrap_err();
    assert!(matches!(err, Error::Transfer(_)));
    obtain.assert();
}

#[test]
fn api_mediated_upload_of_missing_file_contacts_nobody() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let initiate = server
        .mock("POST", "/projects/55/uploads")
        .expect(0)
        .create();

    let err = ApiMediatedUpload::new(&client)
        .upload(&dir.path().join("missing.wav"), &target("missing.wav"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    initiate.assert();
}

#[test]
fn download_of_unknown_name_touches_nothing() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let store = LocalStore::new(dir.path().join("objects")).unwrap();
    mock_files(&mut server, 55, json!([{"id": 1, "name": "dawn.wav", "s3Key": "dawn.wav"}]));

    let dest = dir.path().join("downloads/dusk.wav");
    let err = Downloader::new(&client, &store)
        .download(55, &target("x").bucket, "dusk.wav", &dest)
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(!dest.exists());
    assert!(!dir.path().join("downloads").exists());
}

#[test]
fn upload_then_download_round_trips() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (config, client) = logged_in(&mut server, &dir.path().join("objects"));
    let store = LocalStore::new(dir.path().join("objects")).unwrap();

    let src = dir.path().join("chorus.flac");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 256) as u8).collect();
    fs::write(&src, &data).unwrap();

    let upload_target = target("chorus.flac");
    DirectUpload::new(&store).upload(&src, &upload_target).unwrap();

    mock_files(
        &mut server,
        55,
        json!([{"id": 12, "name": "chorus.flac", "s3Key": "chorus.flac", "metadata": {}}]),
    );
    let dest = dir.path().join(&config.download_dir).join("nested/chorus.flac");
    let bytes = Downloader::new(&client, &store)
        .download(55, &upload_target.bucket, "chorus.flac", &dest)
        .unwrap();

    assert_eq!(bytes, data.len() as u64);
    assert_eq!(fs::read(&dest).unwrap(), data);
}

#[test]
fn download_all_skips_existing_and_continues_after_failures() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    let store = LocalStore::new(dir.path().join("objects")).unwrap();
    let bucket = target("x").bucket;

    let seed = dir.path().join("seed");
    fs::write(&seed, "remote").unwrap();
    store.put_file(&bucket, "a.wav", &seed, "audio/wav").unwrap();
    store.put_file(&bucket, "c.wav", &seed, "audio/wav").unwrap();

    mock_files(
        &mut server,
        55,
        json!([
            {"id": 1, "name": "a.wav", "s3Key": "a.wav"},
            {"id": 2, "name": "b.wav", "s3Key": "b.wav"},
            {"id": 3, "name": "c.wav", "s3Key": "c.wav"}
        ]),
    );

    let dest_dir = dir.path().join("downloads");
    fs::create_dir_all(&dest_dir).unwrap();
    fs::write(dest_dir.join("c.wav"), "local copy").unwrap();

    let outcomes = Downloader::new(&client, &store)
        .download_all(55, &bucket, &dest_dir)
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0].outcome, Outcome::Transferred(6)));
    assert!(matches!(outcomes[1].outcome, Outcome::Failed(Error::NotFound(_))));
    assert!(matches!(outcomes[2].outcome, Outcome::Skipped));
    assert_eq!(fs::read_to_string(dest_dir.join("a.wav")).unwrap(), "remote");
    assert_eq!(fs::read_to_string(dest_dir.join("c.wav")).unwrap(), "local copy");
    assert!(!dest_dir.join("b.wav").exists());
}

#[test]
fn export_writes_listing_as_csv() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let (_, client) = logged_in(&mut server, &dir.path().join("objects"));
    mock_files(
        &mut server,
        55,
        json!([
            {"id": 1, "name": "a.wav", "s3Key": "a.wav", "metadata": {"site": "pond"}},
            {"id": 2, "name": "b.wav"}
        ]),
    );

    let path = dir.path().join("exports/project.csv");
    let rows = export_project(&client, 55, &path).unwrap();

    assert_eq!(rows, 2);
    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "id,name,s3Key\n1,a.wav,a.wav\n2,b.wav,\n"
    );
}
