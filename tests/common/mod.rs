#![allow(dead_code)]

use dataphonia_cli::api::PlatformClient;
use dataphonia_cli::config::Config;
use mockito::{Mock, ServerGuard};
use std::path::Path;

pub const EMAIL: &str = "me@example.org";
pub const PASSWORD: &str = "secret";
pub const SESSION_COOKIE: &str = "session=abc123";

/// Configuration pointing at a mock API and a local object store.
pub fn config_for(api_url: &str, storage_root: &Path) -> Config {
    Config::from_lookup(|name| {
        let value = match name.strip_prefix("DATAPHONIA_")? {
            "API_BASE_URL" => api_url.to_string(),
            "AUTHENTICATION_USERNAME" => EMAIL.to_string(),
            "AUTHENTICATION_PASSWORD" => PASSWORD.to_string(),
            "STORAGE_BACKEND" => "local".to_string(),
            "STORAGE_ROOT" => storage_root.display().to_string(),
            _ => return None,
        };
        Some(value)
    })
    .expect("test configuration")
}

/// Accept the test credentials and hand out a session cookie.
pub fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/auth/login")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "email": EMAIL,
            "password": PASSWORD,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", &format!("{}; Path=/", SESSION_COOKIE))
        .with_body("{}")
        .create()
}

/// Serve a project's file listing to authenticated requests.
pub fn mock_files(server: &mut ServerGuard, project_id: i64, body: serde_json::Value) -> Mock {
    server
        .mock("GET", format!("/projects/{}/files/", project_id).as_str())
        .match_header("cookie", SESSION_COOKIE)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create()
}

/// Log in against `server` with the test configuration.
pub fn logged_in(server: &mut ServerGuard, storage_root: &Path) -> (Config, PlatformClient) {
    mock_login(server);
    let config = config_for(&server.url(), storage_root);
    let client = PlatformClient::login(&config).expect("login");
    (config, client)
}
