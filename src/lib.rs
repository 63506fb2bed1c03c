//! # edgequake-pdf-extract
//!
//! Extract text, Markdown and embedded images from batches of PDF documents.
//!
//! Every page's text is pulled out through pdfium. In Markdown mode the
//! embedded images are extracted too, stored in a local directory, a ZIP
//! archive or an S3 bucket, and linked from the Markdown by path, archive
//! entry or pre-signed URL. Each input file gets its own namespace, so two
//! uploads named `report.pdf` never overwrite each other's images.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Input      load local paths / download URLs
//!  ├─ 2. Namer      one collision-free namespace per file, in input order
//!  ├─ 3. Walker     pages in order, text or Markdown + image slots (spawn_blocking)
//!  ├─ 4. Sink       persist images: local dir / zip archive / S3 + pre-signed URL
//!  ├─ 5. Aggregate  placeholders → links, pages joined with ---PAGE BREAK---
//!  └─ 6. Compose    text, JSON, blob and file messages for the host
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_extract::{
//!     load_inputs, ExtractionConfig, ExtractionMode, Extractor, MarkdownOptions, StorageMode,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .mode(ExtractionMode::Markdown(MarkdownOptions {
//!             storage: StorageMode::Zip,
//!             ..Default::default()
//!         }))
//!         .build()?;
//!
//!     let files = load_inputs(&["a.pdf".to_string(), "b.pdf".to_string()], 120).await?;
//!     let batch = Extractor::new(config)?.run(files).await?;
//!     println!("{}", batch.combined_text());
//!     eprintln!("{} images", batch.stats.images_persisted);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod compose;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod stream;
pub mod tool;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, PdfBackend, PdfSource, PdfiumBackend, RawImage};
pub use compose::{compose, BlobMeta, ToolMessage, NO_FILES_MESSAGE};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, ExtractionMode, MarkdownOptions, S3Settings,
    StorageMode, FILE_BREAK, PAGE_BREAK,
};
pub use error::{DocumentError, ExtractError, ImageError, PageError, StorageError};
pub use extract::Extractor;
pub use output::{
    BatchResult, BatchStats, DocumentFailure, DocumentMetadata, DocumentOutcome, DocumentResult,
    ExtractedImage, FileData, FileOutput, ImageRecord, ImageReference, PageMetadata, PageRecord,
};
pub use pipeline::input::{load_input, load_inputs, InputFile};
pub use pipeline::markdown::{
    MarkdownRenderer, PageContent, TextLayoutRenderer, SKIPPED_IMAGES_NOTICE,
};
pub use pipeline::namer::FileNamespace;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sink::{ObjectStorage, S3ObjectStorage, Sink, SinkError};
pub use stream::DocumentStream;
pub use tool::{Tool, ToolAction, ToolParameters, ToolResponse};
