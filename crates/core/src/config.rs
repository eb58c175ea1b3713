use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Settings block for the storage adapter.
///
/// Read once when the adapter is built and never mutated afterwards.
/// Field names serialize in upper case (`BUCKET`, `PROJECT`, ...).
///
/// `MAX_MEMORY_SIZE` is how many downloaded bytes stay in memory before
/// spilling to a temporary file. The default of `0` means downloads never
/// touch the disk, so very large objects are held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub max_memory_size: u64,
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

/// Credential handle passed through to the client factory untouched.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    AccessToken { token: String },
    MetadataServer,
    Hmac {
        access_key: String,
        secret_key: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken { .. } => f
                .debug_struct("AccessToken")
                .field("token", &"<redacted>")
                .finish(),
            Credentials::MetadataServer => write!(f, "MetadataServer"),
            Credentials::Hmac { access_key, .. } => f
                .debug_struct("Hmac")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .finish(),
        }
    }
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            project: None,
            max_memory_size: 0,
            default_content_type: default_content_type(),
            credentials: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_max_memory_size(mut self, bytes: u64) -> Self {
        self.max_memory_size = bytes;
        self
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| StorageError::Config(format!("failed to parse settings: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(StorageError::Config("BUCKET must not be empty".into()));
        }
        if self.default_content_type.trim().is_empty() {
            return Err(StorageError::Config(
                "DEFAULT_CONTENT_TYPE must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether downloads can ever be written to disk.
    pub fn spills_to_disk(&self) -> bool {
        self.max_memory_size > 0
    }
}
