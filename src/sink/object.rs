//! Object-storage sink: upload each image, hand back a pre-signed URL.
//!
//! The client is behind [`ObjectStorage`] so the sink can be exercised
//! without a bucket. [`S3ObjectStorage`] is the production client built on
//! `object_store`'s Amazon S3 backend; credentials and the default region
//! come from the standard `AWS_*` environment.

use super::{Sink, SinkError};
use crate::config::S3Settings;
use crate::error::{ExtractError, StorageError};
use crate::output::{ExtractedImage, FileOutput, ImageReference};
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimal client surface the sink needs.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// A GET URL for `key` valid for `expires_in`.
    async fn presign_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}

/// S3 (or S3-compatible) client.
pub struct S3ObjectStorage {
    store: AmazonS3,
    bucket: String,
}

impl S3ObjectStorage {
    pub fn from_settings(settings: &S3Settings) -> Result<Self, ExtractError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&settings.bucket);

        if let Some(ref region) = settings.region {
            builder = builder.with_region(region);
        }
        if let Some(ref endpoint) = settings.endpoint {
            if !endpoint.is_empty() {
                let endpoint_url =
                    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                        endpoint.clone()
                    } else {
                        format!("https://{}", endpoint)
                    };
                builder = builder
                    .with_endpoint(&endpoint_url)
                    .with_allow_http(endpoint_url.starts_with("http://"));
            }
        }

        let store = builder
            .build()
            .map_err(|e| ExtractError::StorageNotConfigured(e.to_string()))?;

        info!("Object storage client ready for bucket {}", settings.bucket);
        Ok(Self {
            store,
            bucket: settings.bucket.clone(),
        })
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = ObjectPath::from(key);
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&path, PutPayload::from(bytes::Bytes::from(bytes)), opts)
            .await?;
        Ok(())
    }

    async fn presign_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let path = ObjectPath::from(key);
        let url = self
            .store
            .signed_url(reqwest::Method::GET, &path, expires_in)
            .await?;
        Ok(url.to_string())
    }
}

/// Uploads images under `{prefix}/{namespace}/…` and links them by
/// pre-signed URL.
pub struct ObjectStorageSink {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
    url_ttl: Duration,
}

impl ObjectStorageSink {
    pub fn new(storage: Arc<dyn ObjectStorage>, settings: &S3Settings) -> Self {
        Self {
            storage,
            prefix: settings.normalised_prefix().to_string(),
            url_ttl: Duration::from_secs(settings.url_ttl_secs),
        }
    }

    /// Object key for an entry name.
    pub fn key_for(&self, entry: &str) -> String {
        if self.prefix.is_empty() {
            entry.to_string()
        } else {
            format!("{}/{}", self.prefix, entry)
        }
    }
}

#[async_trait]
impl Sink for ObjectStorageSink {
    async fn persist(&self, image: &ExtractedImage) -> Result<ImageReference, SinkError> {
        let key = self.key_for(&image.entry_name());

        self.storage
            .put_object(&key, image.bytes.clone(), &image.mime_type)
            .await
            .map_err(|e| {
                warn!("Upload of {} failed: {}", key, e);
                SinkError::Rejected(format!("upload {key}: {e}"))
            })?;

        let url = self
            .storage
            .presign_url(&key, self.url_ttl)
            .await
            .map_err(|e| {
                warn!("Pre-signing {} failed: {}", key, e);
                SinkError::Rejected(format!("presign {key}: {e}"))
            })?;

        debug!("Uploaded s3://{}/{}", self.storage.bucket(), key);
        Ok(ImageReference::ObjectStorage {
            bucket: self.storage.bucket().to_string(),
            key,
            url,
            expires_in_secs: self.url_ttl.as_secs(),
        })
    }

    async fn finish(&self) -> Result<Vec<FileOutput>, SinkError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::namer::FileNamespace;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStorage {
        objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
        fail_presign: bool,
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        fn bucket(&self) -> &str {
            "test-bucket"
        }

        async fn put_object(
            &self,
            key: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StorageError> {
            self.objects
                .lock()
                .await
                .insert(key.to_string(), (bytes, content_type.to_string()));
            Ok(())
        }

        async fn presign_url(
            &self,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, StorageError> {
            if self.fail_presign {
                return Err(StorageError::Other("signing key unavailable".into()));
            }
            Ok(format!(
                "https://test-bucket.example.com/{key}?X-Amz-Expires={}",
                expires_in.as_secs()
            ))
        }
    }

    fn image() -> ExtractedImage {
        ExtractedImage {
            namespace: serde_json::from_value::<FileNamespace>("report-abc".into()).unwrap(),
            page_number: 2,
            sequence_in_page: 0,
            bytes: vec![9, 9],
            mime_type: "image/png".into(),
            extension: "png".into(),
        }
    }

    fn settings() -> S3Settings {
        let mut s = S3Settings::new("test-bucket");
        s.prefix = "/exports/".into();
        s.url_ttl_secs = 900;
        s
    }

    #[tokio::test]
    async fn uploads_under_prefix_and_presigns() {
        let storage = Arc::new(MemoryStorage::default());
        let sink = ObjectStorageSink::new(storage.clone(), &settings());

        let reference = sink.persist(&image()).await.unwrap();
        match &reference {
            ImageReference::ObjectStorage {
                bucket,
                key,
                url,
                expires_in_secs,
            } => {
                assert_eq!(bucket, "test-bucket");
                assert_eq!(key, "exports/report-abc/page_2_0.png");
                assert!(url.contains("X-Amz-Expires=900"));
                assert_eq!(*expires_in_secs, 900);
            }
            other => panic!("unexpected reference {other:?}"),
        }

        let objects = storage.objects.lock().await;
        let (bytes, content_type) = &objects["exports/report-abc/page_2_0.png"];
        assert_eq!(bytes, &vec![9, 9]);
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn presign_failure_rejects_image() {
        let storage = Arc::new(MemoryStorage {
            fail_presign: true,
            ..Default::default()
        });
        let sink = ObjectStorageSink::new(storage, &settings());
        let err = sink.persist(&image()).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert!(sink.finish().await.unwrap().is_empty());
    }

    #[test]
    fn empty_prefix_keys_are_bare_entries() {
        let mut s = settings();
        s.prefix = "/".into();
        let sink = ObjectStorageSink::new(Arc::new(MemoryStorage::default()), &s);
        assert_eq!(sink.key_for("ns/page_1_0.png"), "ns/page_1_0.png");
    }
}
