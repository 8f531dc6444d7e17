use crate::config::Config;
use crate::error::ObjectStorageError;
use crate::model::Library;
use crate::store::{CoverStore, LibraryStore};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;

/// S3-compatible object storage holding the library document and cover images.
pub struct ObjectStorage {
    pub client: Client,
    bucket: String,
    service: String,
    document_key: String,
}

impl ObjectStorage {
    pub async fn new(cfg: &Config) -> Result<Self, ObjectStorageError> {
        if cfg.app.get_bucket().is_empty() {
            return Err(ObjectStorageError::BucketMissing);
        }

        let loader = aws_config::from_env();
        let (loader, service) = match &cfg.storage {
            Some(storage) => {
                let credentials = Credentials::new(
                    &storage.aws_access_key_id,
                    &storage.aws_secret_access_key,
                    None,
                    None,
                    "config",
                );
                let loader = loader
                    .region(aws_config::Region::new(storage.aws_region.clone()))
                    .endpoint_url(storage.aws_endpoint_url_s3.clone())
                    .credentials_provider(credentials);
                (loader, storage.service.clone())
            }
            None => {
                let region = std::env::var("AWS_REGION")?;
                (loader.region(aws_config::Region::new(region)), "s3".to_string())
            }
        };

        let config = loader.load().await;

        Ok(Self {
            client: Client::new(&config),
            bucket: cfg.app.get_bucket().to_string(),
            service,
            document_key: cfg.app.get_document_key().to_string(),
        })
    }

    pub async fn get_document(&self) -> Result<Library, ObjectStorageError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.document_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                tracing::info!("no library document at {}, starting empty", self.document_key);
                return Ok(Library::default());
            }
            Err(e) => return Err(ObjectStorageError::S3Error(Box::new(e))),
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStorageError::BodyError(e.to_string()))?
            .into_bytes();

        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn put_document(&self, library: &Library) -> Result<(), ObjectStorageError> {
        let body = serde_json::to_vec_pretty(library)?;
        self.put_object(&self.document_key, body, "application/json")
            .await
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStorageError> {
        tracing::info!("uploading object: {} ({} bytes)", key, data.len());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ObjectStorageError::S3Error(Box::new(e)))?;
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for ObjectStorage {
    async fn load(&self) -> anyhow::Result<Library> {
        Ok(self.get_document().await?)
    }

    async fn save(&self, library: &Library) -> anyhow::Result<()> {
        Ok(self.put_document(library).await?)
    }
}

#[async_trait]
impl CoverStore for ObjectStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        self.put_object(key, bytes, content_type).await?;
        Ok(crate::get_s3_url(&self.service, &self.bucket, key))
    }
}
