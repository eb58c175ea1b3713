use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use gcloud_storage_core::{Credentials, StorageConfig};

use crate::config::{AppConfig, ClientConfig};

#[derive(Args)]
pub struct InitArgs {
    /// Bucket name
    #[arg(long)]
    bucket: String,

    /// Project billed for requests
    #[arg(long)]
    project: Option<String>,

    /// Client type: gcs, s3 or local
    #[arg(long, default_value = "gcs")]
    client: String,

    /// Endpoint override (gcs emulator or S3 interop endpoint)
    #[arg(long)]
    endpoint: Option<String>,

    /// Root directory for the local client
    #[arg(long)]
    root: Option<String>,

    /// Static OAuth access token
    #[arg(long, conflicts_with_all = ["access_key", "metadata_server"])]
    token: Option<String>,

    /// Fetch tokens from the GCE metadata server
    #[arg(long)]
    metadata_server: bool,

    /// HMAC access key (s3 client)
    #[arg(long, requires = "secret_key")]
    access_key: Option<String>,

    /// HMAC secret key (s3 client)
    #[arg(long, requires = "access_key")]
    secret_key: Option<String>,

    /// Bytes kept in memory before downloads spill to disk (0 = never spill)
    #[arg(long, default_value_t = 0)]
    max_memory_size: u64,

    /// Content type used when none can be determined
    #[arg(long)]
    default_content_type: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
}

pub async fn run(config_path: &Path, args: InitArgs) -> Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let config = build_config(args)?;
    config.save(config_path)?;

    info!(config_path = %config_path.display(), bucket = %config.storage.bucket, "Config saved");
    println!("Config written to {}", config_path.display());
    Ok(())
}

fn build_config(args: InitArgs) -> Result<AppConfig> {
    let client = match args.client.as_str() {
        "gcs" => ClientConfig::Gcs {
            endpoint: args.endpoint,
        },
        "s3" => {
            if args.access_key.is_none() {
                anyhow::bail!("--access-key and --secret-key required for the s3 client");
            }
            ClientConfig::S3 {
                endpoint: args.endpoint,
            }
        }
        "local" => {
            let root = args
                .root
                .ok_or_else(|| anyhow::anyhow!("--root required for the local client"))?;
            ClientConfig::Local { root }
        }
        other => anyhow::bail!("unknown client: {other} (supported: gcs, s3, local)"),
    };

    let credentials = match (args.token, args.access_key, args.secret_key) {
        (Some(token), _, _) => Some(Credentials::AccessToken { token }),
        (None, Some(access_key), Some(secret_key)) => Some(Credentials::Hmac {
            access_key,
            secret_key,
        }),
        _ if args.metadata_server => Some(Credentials::MetadataServer),
        _ => None,
    };

    let mut storage = StorageConfig::new(args.bucket).with_max_memory_size(args.max_memory_size);
    if let Some(project) = args.project {
        storage = storage.with_project(project);
    }
    if let Some(credentials) = credentials {
        storage = storage.with_credentials(credentials);
    }
    if let Some(content_type) = args.default_content_type {
        storage = storage.with_default_content_type(content_type);
    }
    storage.validate()?;

    Ok(AppConfig { storage, client })
}
