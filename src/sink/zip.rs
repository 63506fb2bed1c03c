//! In-memory ZIP sink shared by the whole batch.
//!
//! Entries are written as they arrive; the archive is only complete after
//! [`Sink::finish`]. An I/O failure on the archive leaves it in an unknown
//! state, so it is reported as fatal and the batch produces no archive at
//! all. A rejected entry (such as a duplicate name) only loses that entry.

use super::{Sink, SinkError};
use crate::output::{ExtractedImage, FileData, FileOutput, ImageReference};
use async_trait::async_trait;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name of the archive handed back to the host.
pub const ARCHIVE_NAME: &str = "extracted.zip";
pub const ARCHIVE_MIME: &str = "application/zip";

pub struct ZipSink {
    writer: Mutex<Option<ZipWriter<Cursor<Vec<u8>>>>>,
}

impl Default for ZipSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipSink {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Some(ZipWriter::new(Cursor::new(Vec::new())))),
        }
    }

    fn add_entry(&self, entry: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::Fatal("zip archive lock poisoned".into()))?;
        let writer = guard
            .as_mut()
            .ok_or_else(|| SinkError::Fatal("zip archive already finished".into()))?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(entry, options).map_err(|e| match e {
            ZipError::Io(io) => SinkError::Fatal(format!("zip archive: {io}")),
            other => SinkError::Rejected(format!("zip entry {entry}: {other}")),
        })?;
        writer
            .write_all(bytes)
            .map_err(|e| SinkError::Fatal(format!("zip archive: {e}")))?;

        debug!("Zipped {} ({} bytes)", entry, bytes.len());
        Ok(())
    }
}

#[async_trait]
impl Sink for ZipSink {
    async fn persist(&self, image: &ExtractedImage) -> Result<ImageReference, SinkError> {
        let entry = image.entry_name();
        self.add_entry(&entry, &image.bytes)?;
        Ok(ImageReference::Zip { entry })
    }

    async fn persist_markdown(
        &self,
        entry: &str,
        markdown: &str,
    ) -> Result<Option<ImageReference>, SinkError> {
        self.add_entry(entry, markdown.as_bytes())?;
        Ok(Some(ImageReference::Zip {
            entry: entry.to_string(),
        }))
    }

    async fn finish(&self) -> Result<Vec<FileOutput>, SinkError> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Fatal("zip archive lock poisoned".into()))?
            .take()
            .ok_or_else(|| SinkError::Fatal("zip archive already finished".into()))?;

        let bytes = writer
            .finish()
            .map_err(|e| SinkError::Fatal(format!("zip archive: {e}")))?
            .into_inner();

        info!("Zip archive finished: {} bytes", bytes.len());
        Ok(vec![FileOutput {
            file_name: ARCHIVE_NAME.to_string(),
            mime_type: ARCHIVE_MIME.to_string(),
            data: FileData::Bytes(bytes),
        }])
    }
}
