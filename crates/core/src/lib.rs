pub mod backend;
pub mod blob;
pub mod config;
pub mod content_type;
pub mod error;
pub mod file;
pub mod pool;
pub mod spool;
pub mod storage;

pub use blob::{BlobRef, ObjectMetadata};
pub use config::{Credentials, StorageConfig};
pub use error::{Result, StorageError};
pub use file::{ContentFile, FieldFile, FileHandle, StoredFile, UploadedFile};
pub use storage::{GCloudStorage, Storage};
