// UI layer: the interactive menu, built on `dialoguer`.
// Each entry collects its choices, calls into the library and prints a
// one-line result. Operation failures are reported and the loop goes on;
// only terminal I/O errors end the program.

use crate::api::{FileRecord, PlatformClient, Project};
use crate::bucket::normalize;
use crate::config::Config;
use crate::download::{destination_in, fetch_record, Downloader};
use crate::error::Error;
use crate::export::export_project;
use crate::outcome::{tally, Outcome, TransferOutcome};
use crate::storage::ObjectStore;
use crate::upload::{protocol_for, upload_directory, UploadTarget};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

const MENU: &[&str] = &[
    "Show file metadata",
    "Upload a file or folder",
    "Download a file",
    "Download all files of a project",
    "Export project metadata to CSV",
    "List bucket objects",
    "Exit",
];

/// Main interactive menu. Runs until the user chooses "Exit" (or presses
/// Esc / q on the menu).
pub fn main_menu(platform: &PlatformClient, store: &dyn ObjectStore, config: &Config) -> Result<()> {
    println!(
        "Connected to {} (storage: {}, uploads: {:?})",
        config.base_url,
        store.backend_name(),
        config.upload_protocol
    );
    loop {
        println!();
        let selection = Select::new()
            .with_prompt("Menu")
            .items(MENU)
            .default(0)
            .interact_opt()?;
        match selection {
            Some(0) => show_metadata(platform)?,
            Some(1) => upload(platform, store, config)?,
            Some(2) => download_one(platform, store, config)?,
            Some(3) => download_all(platform, store, config)?,
            Some(4) => export(platform, config)?,
            Some(5) => list_bucket(platform, store)?,
            _ => break,
        }
    }
    println!("Goodbye!");
    Ok(())
}

/// Run `f` behind a spinner.
fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    let out = f();
    spinner.finish_and_clear();
    out
}

fn report_ok(message: &str) {
    println!("{}", format!("✔ {}", message).green());
}

fn report_err(context: &str, err: &Error) {
    println!("{}", format!("✘ {}: {}", context, err).red());
}

/// Expand a leading `~/` in a typed path.
fn expand_path(input: &str) -> PathBuf {
    let input = input.trim();
    match input.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(input),
    }
}

/// Let the user pick a project; returns it with its bucket name.
fn choose_project(platform: &PlatformClient) -> Result<Option<(Project, String)>> {
    let projects = match with_spinner("Loading projects...", || platform.list_projects()) {
        Ok(projects) => projects,
        Err(e) => {
            report_err("Could not list projects", &e);
            return Ok(None);
        }
    };
    if projects.is_empty() {
        println!("No project found.");
        return Ok(None);
    }

    let items: Vec<String> = projects
        .iter()
        .map(|p| format!("{} (ID: {})", p.name, p.id))
        .collect();
    let Some(index) = Select::new()
        .with_prompt("Project")
        .items(&items)
        .default(0)
        .interact_opt()?
    else {
        return Ok(None);
    };

    let project = projects[index].clone();
    let bucket = normalize(project.id, &project.name);
    Ok(Some((project, bucket)))
}

/// Let the user pick a file of a project.
fn choose_file(platform: &PlatformClient, project: &Project) -> Result<Option<FileRecord>> {
    let files = match with_spinner("Loading files...", || platform.list_files(project.id)) {
        Ok(files) => files,
        Err(e) => {
            report_err("Could not list files", &e);
            return Ok(None);
        }
    };
    if files.is_empty() {
        println!("No file found in {}.", project.name);
        return Ok(None);
    }

    let items: Vec<String> = files
        .iter()
        .map(|f| format!("{} (ID: {})", f.name, f.id))
        .collect();
    let choice = Select::new()
        .with_prompt("File")
        .items(&items)
        .default(0)
        .interact_opt()?;
    Ok(choice.map(|i| files[i].clone()))
}

fn show_metadata(platform: &PlatformClient) -> Result<()> {
    let Some((project, _)) = choose_project(platform)? else {
        return Ok(());
    };
    let Some(file) = choose_file(platform, &project)? else {
        return Ok(());
    };

    println!("\nMetadata of {} in {}:", file.name, project.name);
    if file.metadata.is_empty() {
        println!("No metadata available.");
    } else {
        for (key, value) in &file.metadata {
            match value {
                serde_json::Value::String(s) => println!("  {}: {}", key, s),
                other => println!("  {}: {}", key, other),
            }
        }
    }
    Ok(())
}

fn upload(platform: &PlatformClient, store: &dyn ObjectStore, config: &Config) -> Result<()> {
    let Some((project, bucket)) = choose_project(platform)? else {
        return Ok(());
    };
    let kinds = ["A file", "A folder"];
    let Some(kind) = Select::new()
        .with_prompt("Upload")
        .items(&kinds)
        .default(0)
        .interact_opt()?
    else {
        return Ok(());
    };

    let protocol = protocol_for(config.upload_protocol, store, platform);

    if kind == 0 {
        let input: String = Input::new().with_prompt("File path").interact_text()?;
        let path = expand_path(&input);
        let Some(key) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            report_err("Upload failed", &Error::NotFound(input));
            return Ok(());
        };
        let target = UploadTarget {
            project_id: project.id,
            bucket: bucket.clone(),
            key: key.clone(),
        };
        match with_spinner("Uploading...", || protocol.upload(&path, &target)) {
            Ok(receipt) => report_ok(&format!(
                "{} uploaded to {}/{} ({} bytes, {})",
                path.display(),
                bucket,
                key,
                receipt.bytes,
                protocol.name()
            )),
            Err(e) => report_err("Upload failed", &e),
        }
    } else {
        let input: String = Input::new().with_prompt("Folder path").interact_text()?;
        let dir = expand_path(&input);
        match with_spinner("Uploading folder...", || {
            upload_directory(protocol.as_ref(), project.id, &bucket, &dir)
        }) {
            Ok(outcomes) => print_outcomes(&outcomes),
            Err(e) => report_err("Upload failed", &e),
        }
    }
    Ok(())
}

fn download_one(platform: &PlatformClient, store: &dyn ObjectStore, config: &Config) -> Result<()> {
    let Some((project, bucket)) = choose_project(platform)? else {
        return Ok(());
    };
    let Some(file) = choose_file(platform, &project)? else {
        return Ok(());
    };

    let destination = match destination_in(&config.download_dir, &file.name) {
        Ok(path) => path,
        Err(e) => {
            report_err("Download failed", &e);
            return Ok(());
        }
    };
    match with_spinner("Downloading...", || {
        fetch_record(store, &file, &bucket, &destination)
    }) {
        Ok(bytes) => report_ok(&format!(
            "Downloaded {} ({} bytes)",
            destination.display(),
            bytes
        )),
        Err(e) => report_err("Download failed", &e),
    }
    Ok(())
}

fn download_all(platform: &PlatformClient, store: &dyn ObjectStore, config: &Config) -> Result<()> {
    let Some((project, bucket)) = choose_project(platform)? else {
        return Ok(());
    };
    let dest_dir = config.download_dir.join(&bucket);
    let downloader = Downloader::new(platform, store);
    match with_spinner("Downloading project...", || {
        downloader.download_all(project.id, &bucket, &dest_dir)
    }) {
        Ok(outcomes) => print_outcomes(&outcomes),
        Err(e) => report_err("Download failed", &e),
    }
    Ok(())
}

fn export(platform: &PlatformClient, config: &Config) -> Result<()> {
    let Some((project, bucket)) = choose_project(platform)? else {
        return Ok(());
    };
    let default_path = config.download_dir.join(format!("{}.csv", bucket));
    let input: String = Input::new()
        .with_prompt("CSV path")
        .default(default_path.display().to_string())
        .interact_text()?;
    let path = expand_path(&input);

    match with_spinner("Exporting...", || export_project(platform, project.id, &path)) {
        Ok(rows) => report_ok(&format!("{} rows written to {}", rows, path.display())),
        Err(e) => report_err("Export failed", &e),
    }
    Ok(())
}

fn list_bucket(platform: &PlatformClient, store: &dyn ObjectStore) -> Result<()> {
    let Some((_, bucket)) = choose_project(platform)? else {
        return Ok(());
    };
    match with_spinner("Listing...", || store.list(&bucket)) {
        Ok(keys) if keys.is_empty() => println!("{} is empty.", bucket),
        Ok(keys) => {
            println!("\n{} ({} objects):", bucket, keys.len());
            for key in keys {
                println!("  {}", key);
            }
        }
        Err(e) => report_err("Listing failed", &Error::from(e)),
    }
    Ok(())
}

fn print_outcomes(outcomes: &[TransferOutcome]) {
    for item in outcomes {
        match &item.outcome {
            Outcome::Transferred(bytes) => println!("  {} {} ({} bytes)", "✔".green(), item.name, bytes),
            Outcome::Skipped => println!("  {} {} (already present)", "-".dark_grey(), item.name),
            Outcome::Failed(e) => println!("  {} {} ({}: {})", "✘".red(), item.name, e.kind(), e),
        }
    }
    let (transferred, skipped, failed) = tally(outcomes);
    let summary = format!(
        "{} transferred, {} skipped, {} failed",
        transferred, skipped, failed
    );
    if failed == 0 {
        report_ok(&summary);
    } else {
        println!("{}", summary.yellow());
    }
}
