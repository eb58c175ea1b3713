use std::path::Path;

use anyhow::Result;
use clap::Args;

use gcloud_storage_core::Storage;

use crate::config::AppConfig;

#[derive(Args)]
pub struct UrlArgs {
    /// Object name
    name: String,
}

pub async fn run(config_path: &Path, args: UrlArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;
    println!("{}", storage.url(&args.name));
    Ok(())
}
