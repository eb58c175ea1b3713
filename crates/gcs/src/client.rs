use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use gcloud_storage_core::backend::{
    ClientFactory, ObjectStoreClient, check_declared_size, not_found,
};
use gcloud_storage_core::{BlobRef, Credentials, ObjectMetadata, Result, StorageError};

use crate::auth::AuthProvider;

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const USER_PROJECT_HEADER: &str = "x-goog-user-project";

/// Object resource as returned by the JSON API. `size` is a decimal string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    size: String,
    content_type: Option<String>,
}

/// Google Cloud Storage JSON API client. Requests are sent once; there is
/// no retry.
#[derive(Clone)]
pub struct GcsClient {
    auth: AuthProvider,
    http: reqwest::Client,
    endpoint: String,
    project: Option<String>,
}

impl GcsClient {
    pub fn new(auth: AuthProvider) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(StorageError::transport)?;
        Ok(Self {
            auth,
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: None,
        })
    }

    /// Points the client at another endpoint, such as an emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Project billed for requests, sent as `x-goog-user-project`.
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    fn base(&self, prefix: &str, blob: &BlobRef) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{prefix}", self.endpoint))
            .map_err(|e| StorageError::Config(format!("bad endpoint {}: {e}", self.endpoint)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("bad endpoint {}", self.endpoint)))?
            .extend(["b", blob.bucket(), "o"]);
        Ok(url)
    }

    fn object_url(&self, blob: &BlobRef) -> Result<Url> {
        if matches!(blob.name(), "" | "." | "..") {
            return Err(StorageError::InvalidName(blob.to_string()));
        }
        let mut url = self.base("storage/v1", blob)?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("bad endpoint {}", self.endpoint)))?
            .push(blob.name());
        Ok(url)
    }

    fn upload_url(&self, blob: &BlobRef) -> Result<Url> {
        if blob.name().is_empty() {
            return Err(StorageError::InvalidName(blob.to_string()));
        }
        let mut url = self.base("upload/storage/v1", blob)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", blob.name());
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut request = request;
        if let Some(token) = self
            .auth
            .get_token()
            .await
            .map_err(StorageError::transport)?
        {
            request = request.bearer_auth(token);
        }
        if let Some(project) = &self.project {
            request = request.header(USER_PROJECT_HEADER, project);
        }
        request.send().await.map_err(StorageError::transport)
    }

    async fn fetch_metadata(&self, blob: &BlobRef) -> Result<Response> {
        let url = self.object_url(blob)?;
        self.send(self.http.get(url)).await
    }
}

async fn check(blob: &BlobRef, op: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(not_found(blob));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StorageError::transport(anyhow::anyhow!(
            "{op} {blob} returned {status}: {body}"
        )));
    }
    Ok(resp)
}

#[async_trait]
impl ObjectStoreClient for GcsClient {
    async fn upload(
        &self,
        blob: &BlobRef,
        data: Bytes,
        size: u64,
        content_type: &str,
    ) -> Result<()> {
        check_declared_size(blob, size, &data)?;
        let url = self.upload_url(blob)?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(data);
        check(blob, "upload", self.send(request).await?).await?;
        debug!(%blob, bytes = size, "upload ok");
        Ok(())
    }

    async fn download(&self, blob: &BlobRef, sink: &mut (dyn Write + Send)) -> Result<u64> {
        let mut url = self.object_url(blob)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let resp = check(blob, "download", self.send(self.http.get(url)).await?).await?;

        let mut stream = resp.bytes_stream();
        let mut total = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(StorageError::transport)?;
            sink.write_all(&chunk)?;
            total += chunk.len() as u64;
        }
        debug!(%blob, bytes = total, "download ok");
        Ok(total)
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        let url = self.object_url(blob)?;
        check(blob, "delete", self.send(self.http.delete(url)).await?).await?;
        debug!(%blob, "delete ok");
        Ok(())
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool> {
        let resp = self.fetch_metadata(blob).await?;
        match check(blob, "exists", resp).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn reload(&self, blob: &BlobRef) -> Result<ObjectMetadata> {
        let resp = check(blob, "reload", self.fetch_metadata(blob).await?).await?;
        let object: ObjectResource = resp.json().await.map_err(StorageError::transport)?;
        let size = object.size.parse::<u64>().map_err(|e| {
            StorageError::transport(anyhow::anyhow!(
                "reload {blob}: invalid size {:?}: {e}",
                object.size
            ))
        })?;
        Ok(ObjectMetadata {
            size,
            content_type: object.content_type,
        })
    }
}

/// Builds a [`GcsClient`] per worker from the configured credentials.
#[derive(Debug, Clone, Default)]
pub struct GcsClientFactory {
    endpoint: Option<String>,
}

impl GcsClientFactory {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }
}

impl ClientFactory for GcsClientFactory {
    fn connect(
        &self,
        project: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ObjectStoreClient>> {
        let auth = AuthProvider::from_credentials(credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let mut client = GcsClient::new(auth)?.with_project(project.map(str::to_owned));
        if let Some(endpoint) = &self.endpoint {
            client = client.with_endpoint(endpoint.clone());
        }
        Ok(Arc::new(client))
    }
}
