//! Configuration types for PDF extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is an explicit value passed
//! into [`crate::extract::Extractor`] and threaded to the walker and the sink;
//! nothing in the pipeline reads global state.
//!
//! The action is modelled as [`ExtractionMode`]: text extraction carries no
//! image options at all, so "save images in text mode" cannot be expressed.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Marker inserted between consecutive pages of one document.
pub const PAGE_BREAK: &str = "\n\n---PAGE BREAK---\n\n";

/// Marker inserted between consecutive documents of one batch.
pub const FILE_BREAK: &str = "\n\n===FILE BREAK===\n\n";

/// Default key prefix for object-storage uploads.
pub const DEFAULT_S3_PREFIX: &str = "pdf-extracts";

/// Default pre-signed URL lifetime (one hour).
pub const DEFAULT_URL_TTL_SECS: u64 = 3600;

/// Longest lifetime S3 accepts for a SigV4 pre-signed URL (seven days).
pub const MAX_URL_TTL_SECS: u64 = 604_800;

/// Configuration for one extraction invocation.
///
/// # Example
/// ```rust
/// use edgequake_pdf_extract::{ExtractionConfig, ExtractionMode, MarkdownOptions, StorageMode};
///
/// let config = ExtractionConfig::builder()
///     .mode(ExtractionMode::Markdown(MarkdownOptions {
///         storage: StorageMode::Zip,
///         ..Default::default()
///     }))
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// What to produce from each document. Default: [`ExtractionMode::Text`].
    pub mode: ExtractionMode,

    /// Documents processed at once. Default: 4.
    ///
    /// Each in-flight document keeps its PDF bytes and decoded images in
    /// memory, so this bounds peak memory as much as it bounds parallelism.
    pub concurrency: usize,

    /// Deadline for walking a single document (text and image extraction),
    /// in seconds. Persisting images is not bounded by it. `0` disables it.
    /// Default: 120.
    pub document_timeout_secs: u64,

    /// PDF user password applied to every encrypted document in the batch.
    pub password: Option<String>,

    /// Receives document-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            concurrency: 4,
            document_timeout_secs: 120,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Markdown options when in Markdown mode.
    pub fn markdown_options(&self) -> Option<&MarkdownOptions> {
        match &self.mode {
            ExtractionMode::Markdown(opts) => Some(opts),
            ExtractionMode::Text => None,
        }
    }

    /// Whether a sink is needed at all: Markdown mode with image saving on.
    pub fn saves_images(&self) -> bool {
        self.markdown_options().is_some_and(|o| o.save_images)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if let ExtractionMode::Markdown(MarkdownOptions {
            storage: StorageMode::S3(s3),
            ..
        }) = &c.mode
        {
            s3.validate()?;
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The action selected by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Verbatim page text; images are never extracted. (default)
    #[default]
    Text,
    /// Page Markdown with image placeholders bound to persisted images.
    Markdown(MarkdownOptions),
}

impl ExtractionMode {
    /// Short label used in logs and JSON (`"text"` / `"markdown"`).
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMode::Text => "text",
            ExtractionMode::Markdown(_) => "markdown",
        }
    }

    /// MIME type of the blob message for this mode.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExtractionMode::Text => "text/plain",
            ExtractionMode::Markdown(_) => "text/markdown",
        }
    }

    /// File extension of textual artefacts for this mode.
    pub fn extension(&self) -> &'static str {
        match self {
            ExtractionMode::Text => "txt",
            ExtractionMode::Markdown(_) => "md",
        }
    }
}

/// Options that only make sense when producing Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// Extract embedded images and persist them through the sink. Default: true.
    pub save_images: bool,

    /// Head every page with `## Page N` and emit one Markdown artefact per
    /// page instead of one per document. Default: false.
    pub split_per_page: bool,

    /// Where persisted images go. Default: a temporary local directory.
    pub storage: StorageMode,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            save_images: true,
            split_per_page: false,
            storage: StorageMode::default(),
        }
    }
}

/// Destination for extracted images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageMode {
    /// Files on disk. `dir: None` means a temporary directory that lives as
    /// long as the returned [`crate::output::BatchResult`].
    Local { dir: Option<PathBuf> },
    /// Entries of one in-memory ZIP archive shared by the whole batch.
    Zip,
    /// Objects in an S3-compatible bucket, addressed by pre-signed URLs.
    S3(S3Settings),
}

impl Default for StorageMode {
    fn default() -> Self {
        StorageMode::Local { dir: None }
    }
}

impl StorageMode {
    pub fn label(&self) -> &'static str {
        match self {
            StorageMode::Local { .. } => "local",
            StorageMode::Zip => "zip",
            StorageMode::S3(_) => "s3",
        }
    }
}

/// Object-storage destination. Credentials are not part of the config;
/// the client reads them from the standard AWS environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Settings {
    pub bucket: String,
    /// Key prefix; leading and trailing slashes are ignored.
    pub prefix: String,
    /// Lifetime of generated pre-signed URLs.
    pub url_ttl_secs: u64,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, …).
    pub endpoint: Option<String>,
}

impl S3Settings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: DEFAULT_S3_PREFIX.to_string(),
            url_ttl_secs: DEFAULT_URL_TTL_SECS,
            region: None,
            endpoint: None,
        }
    }

    fn validate(&self) -> Result<(), ExtractError> {
        if self.bucket.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "S3 storage requires a bucket name".into(),
            ));
        }
        if self.url_ttl_secs == 0 || self.url_ttl_secs > MAX_URL_TTL_SECS {
            return Err(ExtractError::InvalidConfig(format!(
                "Pre-signed URL lifetime must be 1–{MAX_URL_TTL_SECS}s, got {}",
                self.url_ttl_secs
            )));
        }
        Ok(())
    }

    /// The prefix with surrounding slashes removed.
    pub fn normalised_prefix(&self) -> &str {
        self.prefix.trim_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.mode, ExtractionMode::Text);
        assert_eq!(c.concurrency, 4);
        assert!(!c.saves_images());
    }

    #[test]
    fn storage_labels() {
        assert_eq!(StorageMode::default().label(), "local");
        assert_eq!(StorageMode::Zip.label(), "zip");
        assert_eq!(StorageMode::S3(S3Settings::new("b")).label(), "s3");
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ExtractionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn markdown_saves_images_by_default() {
        let c = ExtractionConfig::builder()
            .mode(ExtractionMode::Markdown(MarkdownOptions::default()))
            .build()
            .unwrap();
        assert!(c.saves_images());
        assert_eq!(c.mode.mime_type(), "text/markdown");
    }

    #[test]
    fn s3_requires_bucket() {
        let err = ExtractionConfig::builder()
            .mode(ExtractionMode::Markdown(MarkdownOptions {
                storage: StorageMode::S3(S3Settings::new("  ")),
                ..Default::default()
            }))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn s3_rejects_out_of_range_ttl() {
        let mut s3 = S3Settings::new("bucket");
        s3.url_ttl_secs = MAX_URL_TTL_SECS + 1;
        let result = ExtractionConfig::builder()
            .mode(ExtractionMode::Markdown(MarkdownOptions {
                storage: StorageMode::S3(s3),
                ..Default::default()
            }))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn prefix_is_normalised() {
        let mut s3 = S3Settings::new("bucket");
        s3.prefix = "/exports/pdf/".into();
        assert_eq!(s3.normalised_prefix(), "exports/pdf");
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn markers_are_distinct() {
        assert_ne!(PAGE_BREAK, FILE_BREAK);
        assert!(!FILE_BREAK.contains(PAGE_BREAK.trim()));
    }
}
