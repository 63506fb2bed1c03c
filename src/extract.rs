//! Batch extraction entry points.
//!
//! [`Extractor::run`] processes a whole batch and returns once every
//! document has finished. Documents run concurrently up to
//! `config.concurrency`, but outcomes come back in input order. A broken
//! document becomes a [`DocumentOutcome::Failed`] in its slot; only a sink
//! that can no longer accept anything (the shared ZIP archive) aborts the
//! batch. Use [`crate::stream`] to receive documents as they finish.

use crate::backend::{PdfBackend, PdfiumBackend};
use crate::config::{ExtractionConfig, StorageMode};
use crate::error::{DocumentError, ExtractError, ImageError};
use crate::output::{
    BatchResult, BatchStats, DocumentFailure, DocumentOutcome, DocumentResult, ImageRecord,
    ImageReference,
};
use crate::pipeline::aggregate::{self, AggregateOptions, ResolvedPage};
use crate::pipeline::input::InputFile;
use crate::pipeline::markdown::{MarkdownRenderer, TextLayoutRenderer};
use crate::pipeline::namer::{self, FileNamespace, NamespaceAllocator};
use crate::pipeline::walker::{self, PageFormat, WalkedPage};
use crate::sink::{self, ObjectStorage, Sink, SinkError};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Runs batches with one configuration, backend and renderer.
///
/// Cheap to clone; every component is shared behind an `Arc`.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    backend: Arc<dyn PdfBackend>,
    renderer: Arc<dyn MarkdownRenderer>,
    object_storage: Option<Arc<dyn ObjectStorage>>,
    sink: Option<Arc<dyn Sink>>,
}

impl Extractor {
    /// Extractor backed by pdfium, bound from `PDFIUM_LIB_PATH`, the working
    /// directory or the system library path.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let lib_dir = std::env::var_os("PDFIUM_LIB_PATH").map(std::path::PathBuf::from);
        let backend = PdfiumBackend::bind(lib_dir.as_deref())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Extractor over any [`PdfBackend`].
    pub fn with_backend(config: ExtractionConfig, backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            config,
            backend,
            renderer: Arc::new(TextLayoutRenderer),
            object_storage: None,
            sink: None,
        }
    }

    /// Replace the default Markdown renderer.
    pub fn renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Use this client instead of building one from the S3 settings.
    pub fn object_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.object_storage = Some(storage);
        self
    }

    /// Send images to `sink` instead of the one `StorageMode` selects.
    ///
    /// Only used when the configuration saves images. The sink is finished
    /// at the end of every [`Extractor::run`].
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Whether a caller-supplied sink replaces the configured storage.
    pub(crate) fn has_custom_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract every file of the batch.
    ///
    /// # Errors
    /// Returns `Err` only when no output can be produced at all: the sink
    /// could not be created or became unusable mid-batch. Per-document
    /// failures are reported in [`BatchResult::outcomes`].
    pub async fn run(&self, files: Vec<InputFile>) -> Result<BatchResult, ExtractError> {
        let start = Instant::now();
        let total = files.len();
        info!(
            "Starting {} extraction of {} document(s)",
            self.config.mode.label(),
            total
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        if files.is_empty() {
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_batch_complete(0, 0);
            }
            return Ok(BatchResult {
                mode: self.config.mode.clone(),
                outcomes: Vec::new(),
                files: Vec::new(),
                stats: BatchStats::default(),
                workspace: None,
            });
        }

        // ── Step 1: Namespaces, before anything runs concurrently ─────────
        let namespaces = NamespaceAllocator::allocate_all(&files);

        // ── Step 2: Sink ──────────────────────────────────────────────────
        let (sink, workspace) = self.prepare_sink()?;

        // ── Step 3: Documents, bounded and in input order ─────────────────
        let outcomes: Vec<DocumentOutcome> = stream::iter(
            files
                .into_iter()
                .zip(namespaces)
                .enumerate()
                .map(|(index, (file, ns))| self.process_document(index, file, ns, sink.as_deref())),
        )
        .buffered(self.config.concurrency)
        .try_collect()
        .await?;

        // ── Step 4: Close the sink ────────────────────────────────────────
        let outputs = match &sink {
            Some(s) => s.finish().await?,
            None => Vec::new(),
        };

        let stats = compute_stats(&outcomes, start.elapsed());
        info!(
            "Extraction complete: {}/{} documents, {} pages, {} images, {}ms",
            stats.processed_documents,
            stats.total_documents,
            stats.total_pages,
            stats.images_persisted,
            stats.duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, stats.processed_documents);
        }

        Ok(BatchResult {
            mode: self.config.mode.clone(),
            outcomes,
            files: outputs,
            stats,
            workspace,
        })
    }

    /// Synchronous wrapper around [`Extractor::run`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn run_sync(&self, files: Vec<InputFile>) -> Result<BatchResult, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run(files))
    }

    /// Build the sink the configuration asks for, if any, plus the temporary
    /// directory backing it.
    pub(crate) fn prepare_sink(
        &self,
    ) -> Result<(Option<Arc<dyn Sink>>, Option<Arc<TempDir>>), ExtractError> {
        let Some(options) = self.config.markdown_options().filter(|o| o.save_images) else {
            return Ok((None, None));
        };
        if let Some(ref sink) = self.sink {
            info!("Sink: caller-supplied");
            return Ok((Some(Arc::clone(sink)), None));
        }

        let workspace = match &options.storage {
            StorageMode::Local { dir: None } => Some(Arc::new(
                tempfile::Builder::new()
                    .prefix("pdfx-")
                    .tempdir()
                    .map_err(|e| ExtractError::Internal(format!("tempdir: {e}")))?,
            )),
            _ => None,
        };

        info!("Sink: {} storage", options.storage.label());
        let sink = sink::build_sink(
            options,
            workspace.as_deref().map(TempDir::path),
            self.object_storage.clone(),
        )?;
        Ok((Some(sink), workspace))
    }

    /// Process one document end to end.
    ///
    /// `Err` means the sink failed fatally; everything else is an outcome.
    pub(crate) async fn process_document(
        &self,
        index: usize,
        file: InputFile,
        namespace: FileNamespace,
        sink: Option<&dyn Sink>,
    ) -> Result<DocumentOutcome, ExtractError> {
        let file_name = file.file_name.clone();
        info!("Processing {} as {}", file_name, namespace);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_start(index, &file_name);
        }

        let result = self
            .extract_document(file, namespace.clone(), sink)
            .await?;

        let outcome = match result {
            Ok(doc) => {
                if doc.is_degraded() {
                    warn!(
                        "{}: {} page error(s), {} image error(s)",
                        file_name,
                        doc.page_errors().count(),
                        doc.image_errors.len()
                    );
                }
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_complete(index, &file_name, doc.pages.len(), doc.images.len());
                }
                DocumentOutcome::Completed(doc)
            }
            Err(e) => {
                error!("Failed to process {}: {}", file_name, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_error(index, &file_name, &e.to_string());
                }
                DocumentOutcome::Failed(DocumentFailure {
                    file_name,
                    namespace: namespace.to_string(),
                    error: e,
                })
            }
        };
        Ok(outcome)
    }

    async fn extract_document(
        &self,
        file: InputFile,
        namespace: FileNamespace,
        sink: Option<&dyn Sink>,
    ) -> Result<Result<DocumentResult, DocumentError>, ExtractError> {
        let format = PageFormat::for_mode(&self.config.mode);
        let walk = walker::walk_document(
            Arc::clone(&self.backend),
            Arc::clone(&self.renderer),
            Arc::new(file.bytes),
            self.config.password.clone(),
            namespace.clone(),
            format,
        );
        // The deadline covers the walk only; persisting always runs to the
        // end so every stored object appears in the result.
        let walked = match self.config.document_timeout_secs {
            0 => walk.await,
            secs => tokio::time::timeout(Duration::from_secs(secs), walk)
                .await
                .unwrap_or(Err(DocumentError::Timeout { secs })),
        };
        let walked = match walked {
            Ok(w) => w,
            Err(e) => return Ok(Err(e)),
        };
        debug!("{}: walked {} pages", file.file_name, walked.pages.len());

        let mut resolved = Vec::with_capacity(walked.pages.len());
        for page in walked.pages {
            resolved.push(persist_page(page, sink).await?);
        }

        let options = self.config.markdown_options();
        let mut doc = aggregate::aggregate(
            &file.file_name,
            &namespace,
            walked.metadata,
            resolved,
            AggregateOptions {
                markdown: options.is_some(),
                split_per_page: options.is_some_and(|o| o.split_per_page),
            },
        );

        if let Some(sink) = sink {
            doc.artifacts = persist_markdown(&doc, &namespace, sink).await?;
        }
        Ok(Ok(doc))
    }
}

/// Send a page's images through the sink, keeping one slot per image.
async fn persist_page(
    page: WalkedPage,
    sink: Option<&dyn Sink>,
) -> Result<ResolvedPage, ExtractError> {
    let mut slots: Vec<Result<ImageRecord, ImageError>> = Vec::with_capacity(page.images.len());

    for image in page.images {
        let slot = match (image.outcome, sink) {
            (Err(e), _) => Err(e),
            (Ok(extracted), Some(sink)) => match sink.persist(&extracted).await {
                Ok(reference) => Ok(ImageRecord {
                    page: extracted.page_number,
                    index: extracted.sequence_in_page,
                    mime_type: extracted.mime_type.clone(),
                    reference,
                }),
                Err(SinkError::Rejected(detail)) => Err(ImageError::PersistFailed {
                    page: extracted.page_number,
                    index: extracted.sequence_in_page,
                    detail,
                }),
                Err(fatal @ SinkError::Fatal(_)) => return Err(fatal.into()),
            },
            (Ok(extracted), None) => Err(ImageError::PersistFailed {
                page: extracted.page_number,
                index: extracted.sequence_in_page,
                detail: "no sink configured".into(),
            }),
        };
        if let Err(ref e) = slot {
            warn!("{}", e);
        }
        slots.push(slot);
    }

    Ok(ResolvedPage {
        page_number: page.page_number,
        text: page.text,
        slots,
        error: page.error,
    })
}

/// Write the document's Markdown next to its images: one file per page when
/// paginated, else `{stem}.md`.
async fn persist_markdown(
    doc: &DocumentResult,
    namespace: &FileNamespace,
    sink: &dyn Sink,
) -> Result<Vec<ImageReference>, ExtractError> {
    let files: Vec<(String, &str)> = if doc.paginated {
        doc.pages
            .iter()
            .map(|p| {
                (
                    namer::artifact_entry_name(namespace, &format!("page_{}.md", p.page_number())),
                    p.text.as_str(),
                )
            })
            .collect()
    } else {
        let stem = namer::sanitize_stem(&doc.file_name);
        vec![(
            namer::artifact_entry_name(namespace, &format!("{stem}.md")),
            doc.content.as_str(),
        )]
    };

    let mut artifacts = Vec::new();
    for (entry, markdown) in files {
        match sink.persist_markdown(&entry, markdown).await {
            Ok(Some(reference)) => artifacts.push(reference),
            Ok(None) => {}
            Err(SinkError::Rejected(detail)) => {
                warn!("Markdown artefact {} not stored: {}", entry, detail)
            }
            Err(fatal @ SinkError::Fatal(_)) => return Err(fatal.into()),
        }
    }
    Ok(artifacts)
}

pub(crate) fn compute_stats(outcomes: &[DocumentOutcome], elapsed: Duration) -> BatchStats {
    let mut stats = BatchStats {
        total_documents: outcomes.len(),
        duration_ms: elapsed.as_millis() as u64,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Completed(doc) => {
                stats.processed_documents += 1;
                stats.total_pages += doc.pages.len();
                stats.failed_pages += doc.page_errors().count();
                stats.images_persisted += doc.images.len();
                stats.images_failed += doc.image_errors.len();
            }
            DocumentOutcome::Failed(_) => stats.failed_documents += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionMode, MarkdownOptions};

    #[test]
    fn stats_count_failures() {
        let outcomes = vec![DocumentOutcome::Failed(DocumentFailure {
            file_name: "x.pdf".into(),
            namespace: "x-0".into(),
            error: DocumentError::PasswordRequired,
        })];
        let stats = compute_stats(&outcomes, Duration::from_millis(5));
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.failed_documents, 1);
        assert_eq!(stats.processed_documents, 0);
        assert_eq!(stats.duration_ms, 5);
    }

    struct NoBackend;

    impl PdfBackend for NoBackend {
        fn open<'a>(
            &'a self,
            _bytes: &'a [u8],
            _password: Option<&str>,
        ) -> Result<Box<dyn crate::backend::PdfSource + 'a>, crate::backend::BackendError> {
            Err(crate::backend::BackendError::Corrupt("no backend".into()))
        }
    }

    #[test]
    fn text_mode_needs_no_sink() {
        let extractor = Extractor::with_backend(ExtractionConfig::default(), Arc::new(NoBackend));
        let (sink, workspace) = extractor.prepare_sink().unwrap();
        assert!(sink.is_none());
        assert!(workspace.is_none());
    }

    #[test]
    fn default_local_storage_gets_a_workspace() {
        let config = ExtractionConfig::builder()
            .mode(ExtractionMode::Markdown(MarkdownOptions::default()))
            .build()
            .unwrap();
        let extractor = Extractor::with_backend(config, Arc::new(NoBackend));
        let (sink, workspace) = extractor.prepare_sink().unwrap();
        assert!(sink.is_some());
        assert!(workspace.unwrap().path().exists());
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let extractor = Extractor::with_backend(ExtractionConfig::default(), Arc::new(NoBackend));
        let result = tokio_test::block_on(extractor.run(Vec::new())).unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.stats, BatchStats::default());
    }
}
