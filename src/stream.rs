//! Streaming extraction API: emit documents as they complete.
//!
//! Unlike [`crate::extract::Extractor::run`], which returns only after every
//! document finished, [`Extractor::stream`] yields each
//! [`DocumentOutcome`] as soon as it is ready. With `concurrency > 1`
//! documents may arrive out of input order; every item carries its input
//! index.
//!
//! Storage that is only complete once the batch ends cannot be streamed:
//! the ZIP archive, and the temporary directory used by local storage
//! without an explicit `dir`. Those configurations are rejected up front.

use crate::config::StorageMode;
use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::output::DocumentOutcome;
use crate::pipeline::input::InputFile;
use crate::pipeline::namer::NamespaceAllocator;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A document outcome tagged with its position in the input batch.
pub type IndexedOutcome = (usize, DocumentOutcome);

/// A boxed stream of document outcomes.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<IndexedOutcome, ExtractError>> + Send>>;

impl Extractor {
    /// Extract a batch, streaming documents in completion order.
    ///
    /// # Returns
    /// - `Ok(DocumentStream)`: one item per input file; an `Err` item means
    ///   the sink failed fatally and the stream should be dropped
    /// - `Err(ExtractError)`: the configuration cannot be streamed
    pub fn stream(&self, files: Vec<InputFile>) -> Result<DocumentStream, ExtractError> {
        let configured = self
            .config()
            .markdown_options()
            .filter(|o| o.save_images && !self.has_custom_sink());
        if let Some(opts) = configured {
            match &opts.storage {
                StorageMode::Zip => {
                    return Err(ExtractError::InvalidConfig(
                        "zip storage is only available for whole batches".into(),
                    ))
                }
                StorageMode::Local { dir: None } => {
                    return Err(ExtractError::InvalidConfig(
                        "streaming to local storage needs an explicit directory".into(),
                    ))
                }
                _ => {}
            }
        }

        info!("Starting streaming extraction of {} document(s)", files.len());

        let namespaces = NamespaceAllocator::allocate_all(&files);
        let (sink, _) = self.prepare_sink()?;
        let concurrency = self.config().concurrency;
        let this = self.clone();

        let s = stream::iter(files.into_iter().zip(namespaces).enumerate().map(
            move |(index, (file, ns))| {
                let this = this.clone();
                let sink = sink.clone();
                async move {
                    this.process_document(index, file, ns, sink.as_deref())
                        .await
                        .map(|outcome| (index, outcome))
                }
            },
        ))
        .buffer_unordered(concurrency);

        Ok(Box::pin(s))
    }
}
