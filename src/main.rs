// Entrypoint for the CLI application.
// - Keeps `main` small: load the configuration, log in, open the object
//   store and hand everything to the UI loop.
// - Any startup failure (missing setting, rejected login) exits here,
//   before the first prompt.

use anyhow::Context;
use dataphonia_cli::{api::PlatformClient, config::Config, init_tracing, storage, ui::main_menu};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let platform = PlatformClient::login(&config)
        .with_context(|| format!("Failed to log in to {}", config.base_url))?;
    let store = storage::create_store(&config).context("Failed to open object storage")?;

    // Blocks until the user exits.
    main_menu(&platform, store.as_ref(), &config)?;
    Ok(())
}
