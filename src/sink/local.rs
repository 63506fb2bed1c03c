//! Local-directory sink.

use super::{Sink, SinkError};
use crate::output::{ExtractedImage, FileData, FileOutput, ImageReference};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

const MARKDOWN_MIME: &str = "text/markdown";

/// Writes every entry as a file under `root`, creating per-namespace
/// folders on demand.
pub struct LocalSink {
    root: PathBuf,
    written: Mutex<Vec<FileOutput>>,
}

impl LocalSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            written: Mutex::new(Vec::new()),
        }
    }

    async fn write_entry(
        &self,
        entry: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<PathBuf, SinkError> {
        let path = self.root.join(entry);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SinkError::Rejected(format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SinkError::Rejected(format!("write {}: {e}", path.display())))?;

        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        self.written.lock().await.push(FileOutput {
            file_name: entry.to_string(),
            mime_type: mime_type.to_string(),
            data: FileData::Path(path.clone()),
        });
        Ok(path)
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn persist(&self, image: &ExtractedImage) -> Result<ImageReference, SinkError> {
        let path = self
            .write_entry(&image.entry_name(), &image.bytes, &image.mime_type)
            .await?;
        Ok(ImageReference::Local { path })
    }

    async fn persist_markdown(
        &self,
        entry: &str,
        markdown: &str,
    ) -> Result<Option<ImageReference>, SinkError> {
        let path = self
            .write_entry(entry, markdown.as_bytes(), MARKDOWN_MIME)
            .await?;
        Ok(Some(ImageReference::Local { path }))
    }

    async fn finish(&self) -> Result<Vec<FileOutput>, SinkError> {
        let mut outputs = std::mem::take(&mut *self.written.lock().await);
        outputs.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(outputs)
    }
}
