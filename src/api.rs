// Platform API client: a small blocking HTTP client for the Dataphonia
// REST API. Login happens once, when the client is built; the session
// (cookie jar plus optional bearer token) is read-only afterwards.

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;

/// Authenticated platform session. Build it with [`PlatformClient::login`].
pub struct PlatformClient {
    client: Client,
    /// Plain client for signed URLs: no cookie jar, no platform credentials.
    transfer: Client,
    base_url: String,
    auth: Option<HeaderValue>,
}

/// Login request payload.
#[derive(Serialize, Debug)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Login response. The platform answers with a session cookie; some
/// deployments also return a bearer token in the body.
#[derive(Deserialize, Debug, Default)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// A workspace on the platform.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Platform-side record of one uploaded file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    /// Object key in storage; absent until the platform has placed the file.
    #[serde(rename = "s3Key", alias = "storageKey", default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// State of an API-mediated upload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
}

/// Upload session created by [`PlatformClient::initiate_upload`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: i64,
    pub status: SessionStatus,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InitiateRequest<'a> {
    name: &'a str,
    size: u64,
    mime_type: &'a str,
}

#[derive(Deserialize, Debug)]
struct TransferTarget {
    url: String,
}

#[derive(Serialize, Debug)]
struct FinalizeRequest {
    status: SessionStatus,
}

impl PlatformClient {
    /// Build the HTTP clients and log in with the configured credentials.
    pub fn login(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().cookie_store(true);
        let mut transfer = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
            transfer = transfer.timeout(timeout);
        }
        let client = PlatformClient {
            client: builder.build()?,
            transfer: transfer.build()?,
            base_url: config.base_url.clone(),
            auth: None,
        };
        client.authenticate(&config.username, &config.password)
    }

    /// POST the credentials to `auth/login`. Any non-success answer is a
    /// rejected login.
    fn authenticate(mut self, email: &str, password: &str) -> Result<Self> {
        let res = self
            .client
            .post(self.url("auth/login"))
            .json(&LoginRequest { email, password })
            .send()?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(Error::Authentication(format!("{} - {}", status, txt)));
        }

        let body: LoginResponse = res.json().unwrap_or_default();
        if let Some(token) = body.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Authentication(format!("unusable token: {}", e)))?;
            self.auth = Some(value);
        }
        tracing::info!(user = %email, bearer = self.auth.is_some(), "Logged in");
        Ok(self)
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route.trim_start_matches('/'))
    }

    /// Authorization header when the login returned a token.
    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = &self.auth {
            headers.insert(AUTHORIZATION, value.clone());
        }
        headers
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
        let res = req.headers(self.auth_headers()).send()?;
        let res = check(res, what)?;
        res.json()
            .map_err(|e| Error::Transfer(format!("{}: unreadable response: {}", what, e)))
    }

    fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        tracing::debug!(route = %route, "GET");
        self.send(self.client.get(self.url(route)), route)
    }

    /// All projects visible to the logged-in user.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json("projects/")
    }

    /// File records of a project, in the platform's order.
    pub fn list_files(&self, project_id: i64) -> Result<Vec<FileRecord>> {
        self.get_json(&format!("projects/{}/files/", project_id))
    }

    /// The same listing as [`list_files`](Self::list_files), with every
    /// field kept as sent, in the order sent.
    pub fn list_file_rows(&self, project_id: i64) -> Result<Vec<Map<String, Value>>> {
        self.get_json(&format!("projects/{}/files/", project_id))
    }

    /// First file of the project whose name is exactly `name`.
    pub fn find_file(&self, project_id: i64, name: &str) -> Result<FileRecord> {
        let files = self.list_files(project_id)?;
        let mut matches = files.into_iter().filter(|f| f.name == name);
        let found = matches.next().ok_or_else(|| {
            Error::NotFound(format!("no file named {:?} in project {}", name, project_id))
        })?;
        let duplicates = matches.count();
        if duplicates > 0 {
            tracing::warn!(
                project_id,
                name = %name,
                duplicates,
                "File name is not unique in project, using the first match"
            );
        }
        Ok(found)
    }

    /// Step 1 of the API-mediated upload: register the intent.
    pub fn initiate_upload(
        &self,
        project_id: i64,
        name: &str,
        size: u64,
        mime_type: &str,
    ) -> Result<UploadSession> {
        let route = format!("projects/{}/uploads", project_id);
        tracing::debug!(route = %route, name = %name, size_bytes = size, "POST");
        let req = self.client.post(self.url(&route)).json(&InitiateRequest {
            name,
            size,
            mime_type,
        });
        self.send(req, &route)
    }

    /// Step 2: pre-authorized destination for the raw bytes.
    pub fn transfer_target(&self, session_id: i64) -> Result<String> {
        let target: TransferTarget = self.get_json(&format!("uploads/{}/target", session_id))?;
        Ok(target.url)
    }

    /// Step 3: PUT the file to the signed URL. The request carries no
    /// platform cookie or token; the URL itself is the authorization.
    pub fn put_signed(&self, url: &str, source: &Path, content_type: &str) -> Result<u64> {
        let file = File::open(source)
            .map_err(|e| Error::NotFound(format!("{}: {}", source.display(), e)))?;
        let size = file
            .metadata()
            .map_err(|e| Error::Transfer(format!("{}: {}", source.display(), e)))?
            .len();

        let res = self
            .transfer
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(Body::sized(file, size))
            .send()?;
        check(res, "signed upload")?;
        tracing::info!(size_bytes = size, path = %source.display(), "Signed upload successful");
        Ok(size)
    }

    /// Step 4: mark the session completed.
    pub fn finalize_upload(&self, session_id: i64) -> Result<UploadSession> {
        let route = format!("uploads/{}", session_id);
        tracing::debug!(route = %route, "PATCH");
        let req = self.client.patch(self.url(&route)).json(&FinalizeRequest {
            status: SessionStatus::Completed,
        });
        self.send(req, &route)
    }
}

/// Turn a non-success response into a transfer error carrying status and
/// body. Only the login call reports `Authentication`; a 401 or 404 on a
/// later call is a failed request like any other.
fn check(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let txt = res.text().unwrap_or_default();
    Err(Error::Transfer(format!("{}: {} - {}", what, status, txt)))
}
