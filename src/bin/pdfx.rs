//! CLI binary for edgequake-pdf-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one batch and writes the composed messages.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf_extract::config::DEFAULT_S3_PREFIX;
use edgequake_pdf_extract::{
    compose, load_inputs, ExtractionConfig, ExtractionMode, ExtractionProgressCallback, Extractor,
    FileData, MarkdownOptions, PdfiumBackend, ProgressCallback, S3Settings, StorageMode,
    ToolMessage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the batch and a log line per
/// document. Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.reset_eta();
    }

    fn on_document_start(&self, _index: usize, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_document_complete(&self, _index: usize, file_name: &str, pages: usize, images: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            file_name,
            dim(&format!("{pages} pages, {images} images")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, _index: usize, file_name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file_name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let failed = total_documents.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents extracted  ({} failed)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain text of one document (stdout)
  pdfx document.pdf

  # Markdown with images zipped next to it
  pdfx --mode markdown --storage zip -o out/ a.pdf b.pdf

  # Markdown with images uploaded to S3, links valid for 15 minutes
  pdfx --mode markdown --storage s3 --bucket my-bucket --url-ttl 900 report.pdf

  # One Markdown file per page, images on disk under out/
  pdfx --mode markdown --split-pages -o out/ report.pdf

  # JSON with per-page records
  pdfx --json document.pdf > pages.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Directory containing libpdfium
  AWS_ACCESS_KEY_ID       Object storage credentials (with AWS_SECRET_ACCESS_KEY,
  AWS_SECRET_ACCESS_KEY   AWS_SESSION_TOKEN, AWS_REGION, AWS_ENDPOINT as usual)
  RUST_LOG                Override log filtering
"#;

/// Extract text, Markdown and images from PDF files and URLs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfx",
    version,
    about = "Extract text, Markdown and images from PDF files and URLs",
    long_about = "Extract page text or Markdown from a batch of PDF documents (local files or URLs). \
In Markdown mode embedded images are saved to a directory, a ZIP archive or an S3 bucket and \
linked from the Markdown.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// What to extract.
    #[arg(long, env = "PDFX_MODE", value_enum, default_value = "text")]
    mode: ModeArg,

    /// Where images go in Markdown mode.
    #[arg(long, env = "PDFX_STORAGE", value_enum, default_value = "local")]
    storage: StorageArg,

    /// S3 bucket (required with --storage s3).
    #[arg(long, env = "PDFX_BUCKET")]
    bucket: Option<String>,

    /// S3 key prefix.
    #[arg(long, env = "PDFX_PREFIX", default_value = DEFAULT_S3_PREFIX)]
    prefix: String,

    /// Pre-signed URL lifetime in seconds (1–604800).
    #[arg(long, env = "PDFX_URL_TTL", default_value_t = 3600)]
    url_ttl: u64,

    /// S3 region (defaults to AWS_REGION).
    #[arg(long, env = "PDFX_REGION")]
    region: Option<String>,

    /// Custom S3-compatible endpoint (MinIO, R2, …).
    #[arg(long, env = "PDFX_ENDPOINT")]
    endpoint: Option<String>,

    /// Markdown mode only: do not extract images.
    #[arg(long, env = "PDFX_NO_IMAGES")]
    no_images: bool,

    /// Markdown mode only: `## Page N` headings and one file per page.
    #[arg(long, env = "PDFX_SPLIT_PAGES")]
    split_pages: bool,

    /// Write the text blob and all file outputs into this directory.
    #[arg(short, long, env = "PDFX_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Print the JSON message instead of the text message.
    #[arg(long, env = "PDFX_JSON")]
    json: bool,

    /// Documents processed at once.
    #[arg(short, long, env = "PDFX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-document timeout in seconds (0 disables).
    #[arg(long, env = "PDFX_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFX_PASSWORD")]
    password: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDFX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Text,
    Markdown,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StorageArg {
    Local,
    Zip,
    S3,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    if config.saves_images()
        && matches!(
            config.markdown_options().map(|o| &o.storage),
            Some(StorageMode::Local { dir: None })
        )
        && !cli.quiet
    {
        eprintln!(
            "{} images go to a temporary directory removed on exit; pass --output-dir to keep them",
            cyan("⚠")
        );
    }

    // ── Load inputs ──────────────────────────────────────────────────────
    let files = load_inputs(&cli.inputs, cli.download_timeout)
        .await
        .context("Failed to load inputs")?;

    // ── Run extraction ───────────────────────────────────────────────────
    let backend =
        PdfiumBackend::bind(cli.pdfium_lib.as_deref()).context("Failed to load the PDF engine")?;
    let extractor = Extractor::with_backend(config, Arc::new(backend));
    let batch = extractor.run(files).await.context("Extraction failed")?;
    let messages = compose(&batch).context("Failed to compose output")?;

    // ── Emit messages ────────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for message in &messages {
        match message {
            ToolMessage::Text(text) if !cli.json => {
                write_text(&mut handle, text).context("Failed to write to stdout")?;
            }
            ToolMessage::Json(value) if cli.json => {
                let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
                writeln!(handle, "{json}").context("Failed to write to stdout")?;
            }
            ToolMessage::Blob { bytes, meta } => {
                if let Some(ref dir) = cli.output_dir {
                    write_file(dir, &meta.file_name, bytes).await?;
                }
            }
            ToolMessage::File(file) => {
                if let Some(ref dir) = cli.output_dir {
                    let dest = dir.join(&file.file_name);
                    let already_there = matches!(&file.data, FileData::Path(p) if p == &dest);
                    if !already_there {
                        let bytes = file
                            .read_bytes()
                            .with_context(|| format!("Failed to read {}", file.file_name))?;
                        write_file(dir, &file.file_name, &bytes).await?;
                    }
                }
            }
            _ => {}
        }
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet && !show_progress && !cli.json {
        let stats = &batch.stats;
        eprintln!(
            "Extracted {}/{} documents, {} pages, {} images in {}ms",
            stats.processed_documents,
            stats.total_documents,
            stats.total_pages,
            stats.images_persisted,
            stats.duration_ms
        );
        if stats.failed_documents > 0 || stats.images_failed > 0 {
            eprintln!(
                "  {} documents failed, {} images unavailable",
                stats.failed_documents, stats.images_failed
            );
        }
    }
    if let (Some(dir), false) = (&cli.output_dir, cli.quiet) {
        eprintln!("   output  →  {}", bold(&dir.display().to_string()));
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mode = match cli.mode {
        ModeArg::Text => {
            if cli.no_images || cli.split_pages || cli.storage != StorageArg::Local {
                anyhow::bail!("--storage, --no-images and --split-pages need --mode markdown");
            }
            ExtractionMode::Text
        }
        ModeArg::Markdown => {
            let storage = match cli.storage {
                StorageArg::Local => StorageMode::Local {
                    dir: cli.output_dir.clone(),
                },
                StorageArg::Zip => StorageMode::Zip,
                StorageArg::S3 => {
                    let bucket = cli
                        .bucket
                        .clone()
                        .context("--storage s3 needs --bucket (or PDFX_BUCKET)")?;
                    let mut s3 = S3Settings::new(bucket);
                    s3.prefix = cli.prefix.clone();
                    s3.url_ttl_secs = cli.url_ttl;
                    s3.region = cli.region.clone();
                    s3.endpoint = cli.endpoint.clone();
                    StorageMode::S3(s3)
                }
            };
            ExtractionMode::Markdown(MarkdownOptions {
                save_images: !cli.no_images,
                split_per_page: cli.split_pages,
                storage,
            })
        }
    };

    let mut builder = ExtractionConfig::builder()
        .mode(mode)
        .concurrency(cli.concurrency)
        .document_timeout_secs(cli.timeout);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write `text` and end it with a newline if it lacks one.
fn write_text(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Write `bytes` to `dir/name`, creating parent folders.
async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
