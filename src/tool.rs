//! Host action surface: `to_text` / `to_markdown` with loosely-typed
//! parameters.
//!
//! Hosts send a JSON object of parameters alongside the uploaded files.
//! [`ToolParameters`] deserialises it, [`ToolParameters::into_config`] turns
//! it into a validated [`ExtractionConfig`] for the chosen [`ToolAction`],
//! and [`Tool::invoke`] runs the batch and composes the response messages.

use crate::backend::{PdfBackend, PdfiumBackend};
use crate::compose::{self, ToolMessage};
use crate::config::{
    ExtractionConfig, ExtractionMode, MarkdownOptions, S3Settings, StorageMode,
};
use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::output::BatchResult;
use crate::pipeline::input::InputFile;
use crate::progress::ProgressCallback;
use crate::sink::ObjectStorage;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The action selected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    ToText,
    ToMarkdown,
}

impl FromStr for ToolAction {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "to_text" => Ok(ToolAction::ToText),
            "to_markdown" => Ok(ToolAction::ToMarkdown),
            other => Err(ExtractError::InvalidConfig(format!(
                "Unknown action '{other}'. Expected to_text or to_markdown."
            ))),
        }
    }
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolAction::ToText => "to_text",
            ToolAction::ToMarkdown => "to_markdown",
        })
    }
}

/// `storage_mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Zip,
    S3,
}

/// Parameters as sent by the host. Every field is optional; unknown keys
/// are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolParameters {
    pub save_images: Option<bool>,
    #[serde(alias = "paginate")]
    pub split_per_page: Option<bool>,
    pub storage_mode: Option<StorageKind>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
    #[serde(alias = "presigned_url_expiration")]
    pub presigned_url_ttl_seconds: Option<u64>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub password: Option<String>,
    pub concurrency: Option<usize>,
}

impl ToolParameters {
    /// Parse the host's parameter object. `null` means "no parameters".
    pub fn from_value(value: &Value) -> Result<Self, ExtractError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
            .map_err(|e| ExtractError::InvalidConfig(format!("Invalid parameters: {e}")))
    }

    /// Validated configuration for `action`.
    pub fn into_config(self, action: ToolAction) -> Result<ExtractionConfig, ExtractError> {
        let bucket = non_empty(self.s3_bucket.clone());

        let mode = match action {
            ToolAction::ToText => {
                if self.save_images == Some(true) {
                    return Err(ExtractError::InvalidConfig(
                        "to_text does not extract images; save_images must be false".into(),
                    ));
                }
                if self.split_per_page == Some(true) {
                    return Err(ExtractError::InvalidConfig(
                        "split_per_page is only available for to_markdown".into(),
                    ));
                }
                if matches!(self.storage_mode, Some(StorageKind::Zip | StorageKind::S3))
                    || bucket.is_some()
                {
                    return Err(ExtractError::InvalidConfig(
                        "to_text has no image storage; use to_markdown for zip or s3".into(),
                    ));
                }
                ExtractionMode::Text
            }
            ToolAction::ToMarkdown => {
                let storage = match (self.storage_mode, bucket) {
                    (Some(StorageKind::Zip), _) => StorageMode::Zip,
                    (Some(StorageKind::Local), _) => StorageMode::Local { dir: None },
                    (Some(StorageKind::S3), None) => {
                        return Err(ExtractError::InvalidConfig(
                            "storage_mode s3 requires s3_bucket".into(),
                        ))
                    }
                    (Some(StorageKind::S3) | None, Some(bucket)) => {
                        let mut s3 = S3Settings::new(bucket);
                        if let Some(prefix) = self.s3_prefix.clone() {
                            s3.prefix = prefix;
                        }
                        if let Some(ttl) = self.presigned_url_ttl_seconds {
                            s3.url_ttl_secs = ttl;
                        }
                        s3.region = non_empty(self.s3_region.clone());
                        s3.endpoint = non_empty(self.s3_endpoint.clone());
                        StorageMode::S3(s3)
                    }
                    (None, None) => StorageMode::default(),
                };
                ExtractionMode::Markdown(MarkdownOptions {
                    save_images: self.save_images.unwrap_or(true),
                    split_per_page: self.split_per_page.unwrap_or(false),
                    storage,
                })
            }
        };

        let mut builder = ExtractionConfig::builder().mode(mode);
        if let Some(n) = self.concurrency {
            builder = builder.concurrency(n);
        }
        if let Some(pwd) = non_empty(self.password) {
            builder = builder.password(pwd);
        }
        builder.build()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Messages for the host plus the batch they describe. Local file outputs
/// stay on disk as long as this value lives.
#[derive(Debug)]
pub struct ToolResponse {
    pub messages: Vec<ToolMessage>,
    pub batch: BatchResult,
}

/// Entry point for hosts: one backend, many invocations.
#[derive(Clone)]
pub struct Tool {
    backend: Arc<dyn PdfBackend>,
    object_storage: Option<Arc<dyn ObjectStorage>>,
    progress_callback: Option<ProgressCallback>,
}

impl Tool {
    /// Tool backed by pdfium (see [`Extractor::new`] for library lookup).
    pub fn new() -> Result<Self, ExtractError> {
        let lib_dir = std::env::var_os("PDFIUM_LIB_PATH").map(std::path::PathBuf::from);
        let backend = PdfiumBackend::bind(lib_dir.as_deref())?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    pub fn with_backend(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            object_storage: None,
            progress_callback: None,
        }
    }

    pub fn object_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.object_storage = Some(storage);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    /// Run `action` over `files` with the host's `params`.
    ///
    /// # Errors
    /// Invalid parameters, an object store that cannot be configured, or a
    /// fatal sink failure. Broken documents are reported in the messages.
    pub async fn invoke(
        &self,
        action: ToolAction,
        params: &Value,
        files: Vec<InputFile>,
    ) -> Result<ToolResponse, ExtractError> {
        let mut config = ToolParameters::from_value(params)?.into_config(action)?;
        config.progress_callback = self.progress_callback.clone();

        let mut extractor = Extractor::with_backend(config, Arc::clone(&self.backend));
        if let Some(ref storage) = self.object_storage {
            extractor = extractor.object_storage(Arc::clone(storage));
        }

        let batch = extractor.run(files).await?;
        let messages = compose::compose(&batch)?;
        Ok(ToolResponse { messages, batch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> ToolParameters {
        ToolParameters::from_value(&v).unwrap()
    }

    #[test]
    fn action_parsing() {
        assert_eq!("to_text".parse::<ToolAction>().unwrap(), ToolAction::ToText);
        assert_eq!(" to_markdown ".parse::<ToolAction>().unwrap(), ToolAction::ToMarkdown);
        assert!("to_html".parse::<ToolAction>().is_err());
        assert_eq!(ToolAction::ToMarkdown.to_string(), "to_markdown");
    }

    #[test]
    fn markdown_defaults_to_local_with_images() {
        let config = params(Value::Null).into_config(ToolAction::ToMarkdown).unwrap();
        let opts = config.markdown_options().unwrap();
        assert!(opts.save_images);
        assert!(!opts.split_per_page);
        assert_eq!(opts.storage, StorageMode::Local { dir: None });
    }

    #[test]
    fn bucket_alone_selects_s3() {
        let config = params(json!({
            "s3_bucket": "docs",
            "s3_prefix": "team/",
            "presigned_url_expiration": 600,
            "paginate": true
        }))
        .into_config(ToolAction::ToMarkdown)
        .unwrap();
        let opts = config.markdown_options().unwrap();
        assert!(opts.split_per_page);
        match &opts.storage {
            StorageMode::S3(s3) => {
                assert_eq!(s3.bucket, "docs");
                assert_eq!(s3.normalised_prefix(), "team");
                assert_eq!(s3.url_ttl_secs, 600);
            }
            other => panic!("expected s3, got {other:?}"),
        }
    }

    #[test]
    fn explicit_storage_mode_wins_over_bucket() {
        let config = params(json!({"storage_mode": "zip", "s3_bucket": "docs"}))
            .into_config(ToolAction::ToMarkdown)
            .unwrap();
        assert_eq!(config.markdown_options().unwrap().storage, StorageMode::Zip);
    }

    #[test]
    fn s3_without_bucket_is_rejected() {
        let err = params(json!({"storage_mode": "s3", "s3_bucket": ""}))
            .into_config(ToolAction::ToMarkdown)
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidConfig(_)));
    }

    #[test]
    fn to_text_rejects_image_options() {
        for p in [
            json!({"save_images": true}),
            json!({"storage_mode": "zip"}),
            json!({"s3_bucket": "docs"}),
            json!({"split_per_page": true}),
        ] {
            assert!(params(p).into_config(ToolAction::ToText).is_err());
        }
        let ok = params(json!({"save_images": false, "storage_mode": "local"}))
            .into_config(ToolAction::ToText)
            .unwrap();
        assert_eq!(ok.mode, ExtractionMode::Text);
    }

    #[test]
    fn unknown_keys_ignored_bad_types_rejected() {
        assert!(ToolParameters::from_value(&json!({"colour": "blue"})).is_ok());
        assert!(ToolParameters::from_value(&json!({"save_images": "maybe"})).is_err());
        assert!(ToolParameters::from_value(&json!({"storage_mode": "ftp"})).is_err());
    }
}
