use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use gcloud_storage_core::Storage;

use crate::config::AppConfig;

#[derive(Args)]
pub struct GetArgs {
    /// Object name
    name: String,

    /// Destination file (default: stdout)
    dest: Option<PathBuf>,
}

pub async fn run(config_path: &Path, args: GetArgs) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let storage = config.open_storage()?;

    let mut file = storage.open(&args.name, "rb").await?;

    match args.dest {
        Some(dest) => {
            let mut out = std::fs::File::create(&dest)
                .with_context(|| format!("failed to create {}", dest.display()))?;
            let written = std::io::copy(&mut file, &mut out)?;
            eprintln!("Wrote {written} bytes to {}", dest.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            std::io::copy(&mut file, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
