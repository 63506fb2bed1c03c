//! Image sinks: where extracted images (and the Markdown beside them) go.
//!
//! A [`Sink`] persists one [`ExtractedImage`] at a time and answers with the
//! [`ImageReference`] the Markdown link should point at. Entry names come
//! from the namer, so two documents can never write to the same place.
//!
//! | Storage | Sink | Reference | Outputs from `finish` |
//! |---|---|---|---|
//! | local | [`LocalSink`] | absolute path | one file output per written file |
//! | zip | [`ZipSink`] | entry name in the archive | the archive |
//! | s3 | [`ObjectStorageSink`] | pre-signed URL | none |

pub mod local;
pub mod object;
pub mod zip;

use crate::config::{MarkdownOptions, StorageMode};
use crate::error::ExtractError;
use crate::output::{ExtractedImage, FileOutput, ImageReference};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use self::local::LocalSink;
pub use self::object::{ObjectStorage, ObjectStorageSink, S3ObjectStorage};
pub use self::zip::ZipSink;

/// Failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// This item could not be stored; the batch carries on.
    #[error("{0}")]
    Rejected(String),

    /// The sink itself is unusable; the batch must stop.
    #[error("{0}")]
    Fatal(String),
}

impl From<SinkError> for ExtractError {
    fn from(e: SinkError) -> Self {
        ExtractError::FatalBatch(e.to_string())
    }
}

/// Destination for a batch's images.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Store one image under its entry name.
    async fn persist(&self, image: &ExtractedImage) -> Result<ImageReference, SinkError>;

    /// Store a Markdown file next to the images. Sinks that do not keep
    /// Markdown return `Ok(None)`.
    async fn persist_markdown(
        &self,
        _entry: &str,
        _markdown: &str,
    ) -> Result<Option<ImageReference>, SinkError> {
        Ok(None)
    }

    /// Close the sink and hand back its downloadable outputs.
    async fn finish(&self) -> Result<Vec<FileOutput>, SinkError>;
}

/// Build the sink for `options`.
///
/// `local_root` is the directory used for `Local { dir: None }`; the caller
/// owns its lifetime.
pub fn build_sink(
    options: &MarkdownOptions,
    local_root: Option<&Path>,
    object_storage: Option<Arc<dyn ObjectStorage>>,
) -> Result<Arc<dyn Sink>, ExtractError> {
    let sink: Arc<dyn Sink> = match &options.storage {
        StorageMode::Local { dir } => {
            let root = dir.as_deref().or(local_root).ok_or_else(|| {
                ExtractError::Internal("local storage has no directory".into())
            })?;
            info!("Sink: local directory {}", root.display());
            Arc::new(LocalSink::new(root))
        }
        StorageMode::Zip => {
            info!("Sink: in-memory zip archive");
            Arc::new(ZipSink::new())
        }
        StorageMode::S3(settings) => {
            let storage = match object_storage {
                Some(s) => s,
                None => Arc::new(S3ObjectStorage::from_settings(settings)?),
            };
            info!(
                "Sink: object storage s3://{}/{}",
                storage.bucket(),
                settings.normalised_prefix()
            );
            Arc::new(ObjectStorageSink::new(storage, settings))
        }
    };
    Ok(sink)
}
