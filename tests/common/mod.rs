//! Shared fakes for integration tests: a synthetic PDF backend and an
//! in-memory object store.
//!
//! A "fake PDF" is `%PDF-1.7\n` followed by a JSON [`FakeDoc`]. Anything
//! after the header that is not valid JSON opens as a corrupt document.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf_extract::{
    BackendError, DocumentMetadata, ExtractedImage, FileOutput, ImageReference, ObjectStorage,
    PdfBackend, PdfSource, RawImage, Sink, SinkError, StorageError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FakeDoc {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub pages: Vec<FakePage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FakePage {
    pub text: String,
    /// Image payloads; `None` entries fail to decode.
    #[serde(default)]
    pub images: Vec<Option<String>>,
    /// `"malformed"` or `"corrupt"` makes text extraction fail.
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

pub fn page(text: &str) -> FakePage {
    FakePage {
        text: text.to_string(),
        ..Default::default()
    }
}

pub fn page_with_images(text: &str, images: &[&str]) -> FakePage {
    FakePage {
        text: text.to_string(),
        images: images.iter().map(|s| Some(s.to_string())).collect(),
        ..Default::default()
    }
}

pub fn fake_pdf(doc: &FakeDoc) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.extend(serde_json::to_vec(doc).unwrap());
    bytes
}

pub fn pdf_of(pages: Vec<FakePage>) -> Vec<u8> {
    fake_pdf(&FakeDoc {
        pages,
        ..Default::default()
    })
}

pub struct FakeBackend;

struct FakeSource {
    doc: FakeDoc,
}

impl PdfBackend for FakeBackend {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        password: Option<&str>,
    ) -> Result<Box<dyn PdfSource + 'a>, BackendError> {
        let body = bytes
            .strip_prefix(b"%PDF-1.7\n".as_slice())
            .ok_or_else(|| BackendError::Corrupt("bad header".into()))?;
        let doc: FakeDoc = serde_json::from_slice(body)
            .map_err(|e| BackendError::Corrupt(format!("no xref table: {e}")))?;

        match (&doc.password, password) {
            (Some(_), None) => return Err(BackendError::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => {
                return Err(BackendError::WrongPassword)
            }
            _ => {}
        }
        Ok(Box::new(FakeSource { doc }))
    }
}

impl PdfSource for FakeSource {
    fn page_count(&self) -> usize {
        self.doc.pages.len()
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: self.doc.title.clone(),
            page_count: self.page_count(),
            pdf_version: "Pdf1_7".into(),
            ..Default::default()
        }
    }

    fn page_text(&self, index: usize) -> Result<String, BackendError> {
        let page = &self.doc.pages[index];
        if page.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(page.delay_ms));
        }
        match page.fail.as_deref() {
            Some("malformed") => Err(BackendError::Malformed("bad content stream".into())),
            Some("corrupt") => Err(BackendError::Corrupt("truncated stream".into())),
            _ => Ok(page.text.clone()),
        }
    }

    fn page_images(
        &self,
        index: usize,
    ) -> Result<Vec<Result<RawImage, BackendError>>, BackendError> {
        Ok(self.doc.pages[index]
            .images
            .iter()
            .map(|img| match img {
                Some(payload) => Ok(RawImage {
                    bytes: payload.as_bytes().to_vec(),
                    mime_type: "image/png".into(),
                    extension: "png".into(),
                }),
                None => Err(BackendError::Malformed("unsupported filter".into())),
            })
            .collect())
    }
}

pub fn backend() -> Arc<dyn PdfBackend> {
    Arc::new(FakeBackend)
}

/// In-memory bucket. Keys containing an entry of `reject` fail to upload;
/// every upload takes `put_delay_ms`.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    pub reject: Vec<String>,
    pub put_delay_ms: u64,
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
        if self.put_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.put_delay_ms)).await;
        }
        if self.reject.iter().any(|r| key.contains(r.as_str())) {
            return Err(StorageError::Other("access denied".into()));
        }
        self.objects
            .lock()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn presign_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        Ok(format!(
            "https://test-bucket.s3.example.com/{key}?X-Amz-Expires={}&X-Amz-Signature=abc",
            expires_in.as_secs()
        ))
    }
}

/// Sink that stores nothing. `persist` answers with `persist_error`, and
/// `finish` with `finish_error` when set.
pub struct FailingSink {
    pub persist_error: SinkError,
    pub finish_error: Option<SinkError>,
}

#[async_trait]
impl Sink for FailingSink {
    async fn persist(&self, _image: &ExtractedImage) -> Result<ImageReference, SinkError> {
        Err(self.persist_error.clone())
    }

    async fn finish(&self) -> Result<Vec<FileOutput>, SinkError> {
        match &self.finish_error {
            Some(e) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }
}
