// src/objects.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, PutOptions, PutPayload};
use url::Url;

/// Durable blob storage, keyed by hierarchical string keys.
///
/// The pipeline's only keys look like `certificates/{studentId}/{certId}.pdf`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads bytes under `key` and returns the retrieval location.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError>;

    /// Downloads the blob, or `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// A time-limited retrieval URL.
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}

#[derive(Debug)]
pub enum BlobError {
    Backend(String),
    InvalidKey(String),
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::Backend(msg) => write!(f, "object store error: {}", msg),
            BlobError::InvalidKey(msg) => write!(f, "invalid object key: {}", msg),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        BlobError::Backend(err.to_string())
    }
}

/// [`BlobStore`] backed by the `object_store` crate.
///
/// Production wiring uses the local filesystem backend; tests use the
/// in-memory one. Cloud backends (S3 and friends) plug in through the same
/// `object_store` trait object without touching the consumers.
pub struct ObjectStoreBlobs {
    inner: Arc<dyn object_store::ObjectStore>,
    public_base: Url,
}

impl ObjectStoreBlobs {
    pub fn local(root: &std::path::Path, public_base: Url) -> Result<Self, BlobError> {
        let fs = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self {
            inner: Arc::new(fs),
            public_base,
        })
    }

    pub fn in_memory(public_base: Url) -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            public_base,
        }
    }

    fn location(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base.as_str().trim_end_matches('/'),
            key
        )
    }

    fn path(key: &str) -> Result<ObjectPath, BlobError> {
        ObjectPath::parse(key).map_err(|e| BlobError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobs {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let path = Self::path(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let mut options = PutOptions::default();
        options.attributes = attributes;

        self.inner
            .put_opts(&path, PutPayload::from(bytes), options)
            .await?;

        Ok(self.location(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = Self::path(key)?;
        match self.inner.get(&path).await {
            Ok(result) => Ok(Some(result.bytes().await?.to_vec())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        // The local and in-memory backends cannot sign; an expiring link to
        // the public location keeps the contract. Cloud backends would use
        // their native signers here.
        let expires = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(format!(
            "{}?expires={}",
            self.location(key),
            expires.timestamp()
        ))
    }
}
