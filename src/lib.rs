// Library root
// ------------
// The binary (`main.rs`) wires these modules into the interactive client.
//
// Module responsibilities:
// - `config`: startup settings read from the environment / `dataphonia.env`.
// - `api`: the authenticated platform session (projects, files, upload
//   sessions, signed-URL transfers).
// - `storage`: the `ObjectStore` trait with S3 and local-directory backends.
// - `bucket`: project name to bucket identifier.
// - `upload` / `download`: the transfer sequences built on `api` + `storage`.
// - `export`: CSV export of a project's file listing.
// - `ui`: the terminal menus; it only prints results and delegates the work.
pub mod api;
pub mod bucket;
pub mod config;
pub mod download;
pub mod error;
pub mod export;
pub mod media;
pub mod outcome;
pub mod storage;
pub mod ui;
pub mod upload;

pub use error::{Error, Result};

/// Initialize tracing for the CLI. Defaults to `warn` so log lines do not
/// interleave with the menus; `RUST_LOG` overrides.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
