// Startup configuration. Everything is read once, from the process
// environment after loading `dataphonia.env` and `.env` if present, and
// then handed to the clients by value. A missing required setting stops
// the program before the first prompt.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default multipart threshold: 5 MiB.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;

const PREFIX: &str = "DATAPHONIA_";

/// Which upload protocol the client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolKind {
    /// Write straight to the project bucket.
    #[default]
    Direct,
    /// Register the upload with the platform and write to a signed URL.
    ApiMediated,
}

impl FromStr for ProtocolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "s3" => Ok(ProtocolKind::Direct),
            "api" | "api-mediated" | "signed-url" => Ok(ProtocolKind::ApiMediated),
            other => Err(Error::Configuration(format!(
                "unknown upload protocol {:?} (expected \"direct\" or \"api\")",
                other
            ))),
        }
    }
}

/// Object storage backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3 {
        endpoint: Option<String>,
        region: String,
        access_key: String,
        secret_key: String,
    },
    Local {
        root: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Platform API root, always ending with `/`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Option<Duration>,
    pub storage: StorageConfig,
    pub multipart_threshold: u64,
    pub upload_protocol: ProtocolKind,
    pub download_dir: PathBuf,
}

impl Config {
    /// Load `dataphonia.env` / `.env` and read the `DATAPHONIA_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::from_filename("dataphonia.env").ok();
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source. Names are given
    /// without the `DATAPHONIA_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &str| {
            get(name).ok_or_else(|| {
                Error::Configuration(format!("missing required setting {}{}", PREFIX, name))
            })
        };

        let mut base_url = require("API_BASE_URL")?;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        reqwest::Url::parse(&base_url).map_err(|e| {
            Error::Configuration(format!("{}API_BASE_URL is not a URL: {}", PREFIX, e))
        })?;

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("s3") {
            "s3" => StorageConfig::S3 {
                endpoint: get("STORAGE_HOST"),
                region: get("STORAGE_REGION_NAME").unwrap_or_else(|| "us-east-1".into()),
                access_key: require("STORAGE_ACCESS")?,
                secret_key: require("STORAGE_SECRET")?,
            },
            "local" => StorageConfig::Local {
                root: PathBuf::from(require("STORAGE_ROOT")?),
            },
            other => {
                return Err(Error::Configuration(format!(
                    "unknown storage backend {:?} (expected \"s3\" or \"local\")",
                    other
                )))
            }
        };

        let multipart_threshold = match get("MULTIPART_THRESHOLD") {
            Some(v) => parse_number(&v, "MULTIPART_THRESHOLD")?,
            None => DEFAULT_MULTIPART_THRESHOLD,
        };
        if multipart_threshold == 0 {
            return Err(Error::Configuration(format!(
                "{}MULTIPART_THRESHOLD must be positive",
                PREFIX
            )));
        }

        let request_timeout = get("REQUEST_TIMEOUT_SECS")
            .map(|v| parse_number(&v, "REQUEST_TIMEOUT_SECS"))
            .transpose()?
            .map(Duration::from_secs);

        let upload_protocol = get("UPLOAD_PROTOCOL")
            .map(|v| v.parse::<ProtocolKind>())
            .transpose()?
            .unwrap_or_default();

        Ok(Config {
            base_url,
            username: require("AUTHENTICATION_USERNAME")?,
            password: require("AUTHENTICATION_PASSWORD")?,
            request_timeout,
            storage,
            multipart_threshold,
            upload_protocol,
            download_dir: get("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("downloads")),
        })
    }
}

fn parse_number(value: &str, name: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        Error::Configuration(format!(
            "{}{} must be a whole number, got {:?}",
            PREFIX, name, value
        ))
    })
}
