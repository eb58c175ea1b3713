use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gcloud_storage_core::backend::local::LocalClient;
use gcloud_storage_core::backend::s3::S3InteropFactory;
use gcloud_storage_core::backend::{ClientFactory, ObjectStoreClient};
use gcloud_storage_core::{Credentials, GCloudStorage, StorageConfig};
use gcloud_storage_gcs::GcsClientFactory;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Which object-store client the adapter talks through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientConfig {
    #[serde(rename = "gcs")]
    Gcs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
    #[serde(rename = "s3")]
    S3 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
    #[serde(rename = "local")]
    Local { root: String },
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::Gcs { endpoint: None }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gcloud-storage")
            .join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("config not found at {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("failed to parse config")?;
        config.storage.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn client_factory(&self) -> Arc<dyn ClientFactory> {
        match &self.client {
            ClientConfig::Gcs { endpoint } => Arc::new(GcsClientFactory::new(endpoint.clone())),
            ClientConfig::S3 { endpoint } => Arc::new(S3InteropFactory::new(endpoint.as_deref())),
            ClientConfig::Local { root } => {
                let root = PathBuf::from(root);
                Arc::new(
                    move |_: Option<&str>,
                          _: Option<&Credentials>|
                          -> gcloud_storage_core::Result<Arc<dyn ObjectStoreClient>> {
                        Ok(Arc::new(LocalClient::new(&root)))
                    },
                )
            }
        }
    }

    pub fn open_storage(&self) -> Result<GCloudStorage> {
        GCloudStorage::new(self.storage.clone(), self.client_factory())
            .context("failed to set up storage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = AppConfig {
            storage: StorageConfig::new("media")
                .with_project("acme")
                .with_max_memory_size(4096)
                .with_credentials(Credentials::AccessToken {
                    token: "tok".into(),
                }),
            client: ClientConfig::Gcs {
                endpoint: Some("http://localhost:4443".into()),
            },
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.storage, config.storage);
        assert_eq!(loaded.client, config.client);
    }

    #[test]
    fn client_defaults_to_gcs() {
        let config: AppConfig = toml::from_str(
            r#"
            [storage]
            BUCKET = "media"
            "#,
        )
        .unwrap();
        assert_eq!(config.client, ClientConfig::Gcs { endpoint: None });
        assert_eq!(config.storage.default_content_type, "application/octet-stream");
    }

    #[test]
    fn local_client_config() {
        let config: AppConfig = toml::from_str(
            r#"
            [storage]
            BUCKET = "media"

            [client]
            type = "local"
            root = "/srv/objects"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.client,
            ClientConfig::Local {
                root: "/srv/objects".into()
            }
        );
        assert!(config.open_storage().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(&dir.path().join("absent.toml")).is_err());
    }
}
