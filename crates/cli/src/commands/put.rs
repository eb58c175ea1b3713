use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use gcloud_storage_core::{FileHandle, Storage, UploadedFile};

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct PutArgs {
    /// Local file to upload
    file: PathBuf,

    /// Object name (default: the file name)
    name: Option<String>,

    /// Content type to declare for the upload
    #[arg(long)]
    content_type: Option<String>,
}

pub async fn run(config_path: &Path, args: PutArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;

    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                anyhow::anyhow!("cannot derive an object name from {}", args.file.display())
            })?,
    };

    let mut upload = UploadedFile::open(&args.file, args.content_type)
        .with_context(|| format!("failed to open {}", args.file.display()))?;
    let bytes = upload.size();

    let spinner = progress::create_spinner(&format!("Uploading {name}..."));
    let saved = storage.save(&name, &mut upload).await?;
    spinner.finish_with_message(format!(
        "Uploaded {saved} ({})",
        progress::format_bytes(bytes)
    ));

    println!("{}", storage.url(&saved));
    Ok(())
}
